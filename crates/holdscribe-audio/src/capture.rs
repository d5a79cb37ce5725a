//! Per-session capture worker.
//!
//! `CaptureChannel::arm` spawns a thread that opens the microphone and loops
//! reading fixed-size frames into a fresh [`FrameQueue`] while the armed flag
//! is set. The worker owns the stream and drops it on every exit path. When
//! it finishes, a drop guard sends its [`CaptureReport`] over a channel, so
//! the controller can wait with a bound and abandon a wedged worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use holdscribe_core::types::AudioFormat;

use crate::{CaptureError, FrameQueue, MicrophoneSource};

/// Summary the worker hands back when it exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Frames pushed to the queue.
    pub frames: usize,
    /// Bytes pushed to the queue.
    pub bytes: usize,
    /// Open or read failure that stopped the worker, if any.
    pub error: Option<CaptureError>,
}

/// Result of waiting for the capture worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The worker exited and released its stream.
    Finished(CaptureReport),
    /// The worker did not exit within the timeout and was left running.
    Abandoned,
}

/// A running capture session.
///
/// Dropping the channel disarms it; the worker then exits after its current
/// read.
pub struct CaptureChannel {
    armed: Arc<AtomicBool>,
    queue: FrameQueue,
    done_rx: Receiver<CaptureReport>,
    handle: Option<JoinHandle<()>>,
    outcome: Option<JoinOutcome>,
}

impl CaptureChannel {
    /// Spawn a capture worker reading from `source` in `format`.
    pub fn arm(
        source: Arc<dyn MicrophoneSource>,
        format: AudioFormat,
    ) -> Result<Self, CaptureError> {
        let armed = Arc::new(AtomicBool::new(true));
        let queue = FrameQueue::new();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        let worker_armed = Arc::clone(&armed);
        let worker_queue = queue.clone();
        let handle = thread::Builder::new()
            .name("holdscribe-capture".to_string())
            .spawn(move || {
                let mut guard = CompletionGuard::new(done_tx);
                run_worker(
                    source.as_ref(),
                    &format,
                    &worker_armed,
                    &worker_queue,
                    &mut guard.report,
                );
            })
            .map_err(|e| CaptureError::Spawn(e.to_string()))?;

        debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            frame_bytes = format.frame_bytes(),
            "Capture worker started"
        );

        Ok(Self {
            armed,
            queue,
            done_rx,
            handle: Some(handle),
            outcome: None,
        })
    }

    /// Ask the worker to stop after its current read. Idempotent.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Whether the worker is still expected to capture.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for the worker to exit.
    ///
    /// Does not disarm; call [`CaptureChannel::disarm`] first. On timeout the
    /// worker thread is detached and keeps its own handle to the queue.
    /// Repeated calls return the first outcome.
    pub fn join(&mut self, timeout: Duration) -> JoinOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let outcome = match self.done_rx.recv_timeout(timeout) {
            Ok(report) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                JoinOutcome::Finished(report)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Capture worker did not stop in time, abandoning it"
                );
                self.handle.take();
                JoinOutcome::Abandoned
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                JoinOutcome::Finished(CaptureReport {
                    error: Some(CaptureError::Read(
                        "capture worker exited without a report".to_string(),
                    )),
                    ..CaptureReport::default()
                })
            }
        };

        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Take every frame captured so far, in order.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.queue.drain()
    }

    /// Frames currently queued.
    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for CaptureChannel {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Sends the worker's report when the worker thread unwinds or returns.
struct CompletionGuard {
    tx: Sender<CaptureReport>,
    report: CaptureReport,
}

impl CompletionGuard {
    fn new(tx: Sender<CaptureReport>) -> Self {
        Self {
            tx,
            report: CaptureReport::default(),
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if thread::panicking() && self.report.error.is_none() {
            self.report.error = Some(CaptureError::Read("capture worker panicked".to_string()));
        }
        let _ = self.tx.send(std::mem::take(&mut self.report));
    }
}

fn run_worker(
    source: &dyn MicrophoneSource,
    format: &AudioFormat,
    armed: &AtomicBool,
    queue: &FrameQueue,
    report: &mut CaptureReport,
) {
    let mut reader = match source.open(format) {
        Ok(reader) => reader,
        Err(e) => {
            armed.store(false, Ordering::Release);
            warn!(error = %e, "Could not open microphone");
            report.error = Some(e);
            return;
        }
    };
    info!("Recording...");

    while armed.load(Ordering::Acquire) {
        match reader.read_frame() {
            Ok(Some(frame)) => {
                report.frames += 1;
                report.bytes += frame.len();
                queue.push(frame);
            }
            Ok(None) => {
                debug!(frames = report.frames, "Microphone stream ended");
                break;
            }
            Err(e) => {
                armed.store(false, Ordering::Release);
                warn!(error = %e, frames = report.frames, "Microphone read failed, stopping capture");
                report.error = Some(e);
                break;
            }
        }
    }

    drop(reader);
    debug!(
        frames = report.frames,
        bytes = report.bytes,
        "Microphone stream closed"
    );
}
