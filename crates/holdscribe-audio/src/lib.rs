//! HoldScribe Audio crate - microphone capture for push-to-talk sessions.
//!
//! Provides the trait seam over a microphone stream, the per-session capture
//! worker, and the frame queue it fills. Includes a scripted mock microphone
//! for exercising sessions without real audio hardware.

mod capture;
mod cpal_source;
mod queue;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use holdscribe_core::error::HoldscribeError;
use holdscribe_core::types::AudioFormat;

pub use capture::{CaptureChannel, CaptureReport, JoinOutcome};
pub use cpal_source::{downmix, to_pcm16, CpalMicrophone};
pub use queue::FrameQueue;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while opening or reading a microphone stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The stream could not be opened (no device, unsupported config, ...).
    #[error("failed to open microphone: {0}")]
    Open(String),

    /// A frame read failed after the stream was open.
    #[error("microphone read failed: {0}")]
    Read(String),

    /// The capture worker thread could not be started.
    #[error("failed to start capture worker: {0}")]
    Spawn(String),
}

impl From<CaptureError> for HoldscribeError {
    fn from(err: CaptureError) -> Self {
        HoldscribeError::Capture(err.to_string())
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A source of microphone streams.
///
/// `open` is called on the capture worker thread, so the returned reader never
/// has to cross threads.
pub trait MicrophoneSource: Send + Sync {
    /// Open a stream delivering PCM in the given format.
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn FrameReader>, CaptureError>;
}

/// An open microphone stream. Dropping it releases the device.
pub trait FrameReader {
    /// Block until one fixed-size frame (`format.frame_bytes()` bytes of
    /// little-endian 16-bit PCM) is available.
    ///
    /// Returns `Ok(None)` when the stream has ended and no more frames will
    /// arrive.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, CaptureError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// What a [`MockMicrophone`] does once its scripted frames are used up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEnd {
    /// Report end of stream.
    EndOfStream,
    /// Fail the next read with the given message.
    ReadError(String),
    /// Block inside the read until [`MockMicrophone::unblock`] is called.
    Block,
}

/// Scripted microphone for testing.
///
/// Every `open` replays the same frames, then behaves according to its
/// [`ScriptEnd`]. Tests can wait for the script to be exhausted before
/// releasing the trigger, which makes capture deterministic.
#[derive(Debug)]
pub struct MockMicrophone {
    frames: Vec<Vec<u8>>,
    end: ScriptEnd,
    open_error: Option<String>,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    exhausted_tx: Sender<()>,
    exhausted_rx: Receiver<()>,
    gate_tx: Sender<()>,
    gate_rx: Receiver<()>,
}

impl MockMicrophone {
    pub fn new(frames: Vec<Vec<u8>>, end: ScriptEnd) -> Self {
        let (exhausted_tx, exhausted_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        Self {
            frames,
            end,
            open_error: None,
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            exhausted_tx,
            exhausted_rx,
            gate_tx,
            gate_rx,
        }
    }

    /// A microphone that delivers `frames` and then ends the stream.
    pub fn with_frames(frames: Vec<Vec<u8>>) -> Self {
        Self::new(frames, ScriptEnd::EndOfStream)
    }

    /// A microphone that cannot be opened.
    pub fn failing_open(message: &str) -> Self {
        let mut mic = Self::new(Vec::new(), ScriptEnd::EndOfStream);
        mic.open_error = Some(message.to_string());
        mic
    }

    /// Number of times a stream has been opened.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of opened streams that have since been dropped.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` streams have been dropped.
    pub fn wait_closes(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.closes() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }

    /// Wait until a reader has handed out every scripted frame.
    pub fn wait_exhausted(&self, timeout: Duration) -> bool {
        self.exhausted_rx.recv_timeout(timeout).is_ok()
    }

    /// Release one reader blocked by [`ScriptEnd::Block`].
    pub fn unblock(&self) {
        let _ = self.gate_tx.send(());
    }
}

impl MicrophoneSource for MockMicrophone {
    fn open(&self, _format: &AudioFormat) -> Result<Box<dyn FrameReader>, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.open_error {
            return Err(CaptureError::Open(message.clone()));
        }
        Ok(Box::new(MockReader {
            frames: self.frames.iter().cloned().collect(),
            end: self.end.clone(),
            exhausted_tx: self.exhausted_tx.clone(),
            gate_rx: self.gate_rx.clone(),
            signalled: false,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct MockReader {
    frames: VecDeque<Vec<u8>>,
    end: ScriptEnd,
    exhausted_tx: Sender<()>,
    gate_rx: Receiver<()>,
    signalled: bool,
    closes: Arc<AtomicUsize>,
}

impl Drop for MockReader {
    fn drop(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl FrameReader for MockReader {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        if !self.signalled {
            self.signalled = true;
            let _ = self.exhausted_tx.send(());
        }
        match &self.end {
            ScriptEnd::EndOfStream => Ok(None),
            ScriptEnd::ReadError(message) => Err(CaptureError::Read(message.clone())),
            ScriptEnd::Block => {
                let _ = self.gate_rx.recv();
                Ok(None)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
