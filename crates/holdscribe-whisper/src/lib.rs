//! HoldScribe Whisper crate - turning captured PCM into text.
//!
//! The [`TranscriptionAdapter`] writes a session's audio into a scoped WAV
//! file and hands it to a [`SpeechModel`]. The real model is whisper.cpp
//! (feature `whisper`); a mock model is provided for testing.

mod adapter;
pub mod wav;
mod whisper_service;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use holdscribe_core::config::ModelConfig;
use holdscribe_core::error::HoldscribeError;
use holdscribe_core::types::AudioFormat;

pub use adapter::TranscriptionAdapter;
pub use whisper_service::WhisperModel;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Whisper transcription engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the GGML model file.
    pub model_path: PathBuf,
    /// Language code for transcription (e.g., "en", "auto").
    pub language: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            language: "en".to_string(),
        }
    }
}

impl From<&ModelConfig> for WhisperConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model_path: config.model_path(),
            language: config.language.clone(),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Why a transcription produced no text. Neither kind is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    /// The audio container could not be written.
    #[error("could not write audio file: {0}")]
    StreamWrite(String),

    /// The model failed on the audio.
    #[error("speech model failed: {0}")]
    Model(String),
}

impl From<TranscriptionError> for HoldscribeError {
    fn from(err: TranscriptionError) -> Self {
        HoldscribeError::Transcription(err.to_string())
    }
}

// =============================================================================
// Payload
// =============================================================================

/// One session's worth of captured audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    /// Little-endian 16-bit PCM, interleaved if multi-channel.
    pub pcm: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioPayload {
    /// Concatenate captured frames in order.
    pub fn from_frames(frames: Vec<Vec<u8>>, format: AudioFormat) -> Self {
        Self {
            pcm: frames.concat(),
            format,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn len_bytes(&self) -> usize {
        self.pcm.len()
    }

    /// Recorded duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.format.duration_secs(self.pcm.len())
    }
}

// =============================================================================
// Trait
// =============================================================================

/// A speech-to-text model that reads an audio file.
///
/// The call is blocking and may take seconds for long recordings.
pub trait SpeechModel: Send + Sync {
    /// Transcribe the WAV file at `path`, using `language` as the target.
    fn transcribe_file(&self, path: &Path, language: &str) -> Result<String, TranscriptionError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// One call observed by [`MockSpeechModel`].
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub path: PathBuf,
    pub language: String,
    /// Whether the audio file existed while the model ran.
    pub file_existed: bool,
    /// Samples read back from the file, if it was a valid WAV.
    pub samples: Option<usize>,
}

/// Mock speech model returning a fixed response.
#[derive(Debug)]
pub struct MockSpeechModel {
    response: Result<String, String>,
    calls: Mutex<Vec<ModelCall>>,
}

impl MockSpeechModel {
    /// A model that always answers with `text`.
    pub fn returning(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A model that always fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl SpeechModel for MockSpeechModel {
    fn transcribe_file(&self, path: &Path, language: &str) -> Result<String, TranscriptionError> {
        let call = ModelCall {
            path: path.to_path_buf(),
            language: language.to_string(),
            file_existed: path.exists(),
            samples: wav::read_pcm16(path).ok().map(|(samples, _)| samples.len()),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        tracing::debug!(path = %path.display(), "Mock transcription");
        self.response.clone().map_err(TranscriptionError::Model)
    }
}

// =============================================================================
// Tests
// =============================================================================
