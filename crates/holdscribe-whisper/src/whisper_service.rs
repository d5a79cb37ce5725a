//! Real Whisper transcription via whisper-rs (whisper.cpp bindings).
//!
//! When compiled with the `whisper` feature, loads a GGML model file once and
//! runs speech-to-text inference on each session's WAV file. Without the
//! feature, provides a stub that fails every call.

use std::path::Path;

use crate::{SpeechModel, TranscriptionError, WhisperConfig};

/// Whisper model backed by whisper.cpp.
///
/// Holds a loaded model context that is reused for every session.
pub struct WhisperModel {
    #[cfg(feature = "whisper")]
    ctx: whisper_rs::WhisperContext,
    config: WhisperConfig,
}

impl WhisperModel {
    /// Load the GGML model named in `config`.
    ///
    /// # Errors
    /// Returns `TranscriptionError::Model` if the model file doesn't exist
    /// or fails to load.
    #[cfg(feature = "whisper")]
    pub fn load(config: WhisperConfig) -> Result<Self, TranscriptionError> {
        use whisper_rs::{WhisperContext, WhisperContextParameters};

        let model_path = config.model_path.to_str().ok_or_else(|| {
            TranscriptionError::Model(format!(
                "Model path is not valid UTF-8: {}",
                config.model_path.display()
            ))
        })?;
        if !config.model_path.exists() {
            return Err(TranscriptionError::Model(format!(
                "Whisper model file not found: {}",
                model_path
            )));
        }

        tracing::info!(model = %model_path, lang = %config.language, "Loading Whisper model");

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(model_path, params).map_err(|e| {
            TranscriptionError::Model(format!("Failed to load Whisper model: {}", e))
        })?;

        tracing::info!("Whisper model loaded successfully");
        Ok(Self { ctx, config })
    }

    /// Stub constructor when the `whisper` feature is disabled.
    #[cfg(not(feature = "whisper"))]
    pub fn load(config: WhisperConfig) -> Result<Self, TranscriptionError> {
        tracing::debug!(model = %config.model_path.display(), "Whisper backend not compiled in");
        Ok(Self { config })
    }

    /// Whether this build can actually transcribe.
    pub const fn has_backend() -> bool {
        cfg!(feature = "whisper")
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Real implementation (whisper feature enabled)
// ---------------------------------------------------------------------------

#[cfg(feature = "whisper")]
impl SpeechModel for WhisperModel {
    fn transcribe_file(&self, path: &Path, language: &str) -> Result<String, TranscriptionError> {
        use whisper_rs::{FullParams, SamplingStrategy};

        let (samples, spec) = crate::wav::read_pcm16(path)?;
        let mono = crate::wav::to_mono_f32(&samples, spec.channels);

        // Whisper expects 16 kHz mono PCM.
        let samples_16k = holdscribe_core::dsp::resample_linear(&mono, spec.sample_rate, 16000);

        tracing::debug!(
            samples = samples_16k.len(),
            duration_secs = samples_16k.len() as f32 / 16000.0,
            "Starting Whisper transcription"
        );

        let mut state = self.ctx.create_state().map_err(|e| {
            TranscriptionError::Model(format!("Failed to create Whisper state: {}", e))
        })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // "auto" lets the model detect the language.
        let lang = if language == "auto" {
            None
        } else {
            Some(language)
        };
        params.set_language(lang);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &samples_16k)
            .map_err(|e| TranscriptionError::Model(format!("Whisper inference failed: {}", e)))?;

        let n_segments = state.full_n_segments().map_err(|e| {
            TranscriptionError::Model(format!("Failed to get segment count: {}", e))
        })?;

        let mut full_text = String::new();
        for i in 0..n_segments {
            let text = state.full_get_segment_text(i).map_err(|e| {
                TranscriptionError::Model(format!("Failed to get segment {} text: {}", i, e))
            })?;
            full_text.push_str(&text);
        }

        tracing::info!(
            segments = n_segments,
            text_len = full_text.len(),
            "Transcription complete"
        );

        Ok(full_text)
    }
}

// ---------------------------------------------------------------------------
// Stub implementation (whisper feature disabled)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "whisper"))]
impl SpeechModel for WhisperModel {
    fn transcribe_file(&self, _path: &Path, _language: &str) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::Model(
            "Whisper transcription requires the `whisper` feature to be enabled".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_whisper_model_no_model_file() {
        let config = WhisperConfig {
            model_path: PathBuf::from("/nonexistent/ggml-base.bin"),
            language: "en".to_string(),
        };
        let result = WhisperModel::load(config);
        // Without whisper feature: succeeds (stub). With: fails (no file).
        #[cfg(feature = "whisper")]
        assert!(result.is_err());
        #[cfg(not(feature = "whisper"))]
        assert!(result.is_ok());
    }

    #[test]
    fn test_has_backend_follows_feature() {
        assert_eq!(WhisperModel::has_backend(), cfg!(feature = "whisper"));
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_whisper_model_stub_returns_error() {
        let model = WhisperModel::load(WhisperConfig::default()).unwrap();
        let result = model.transcribe_file(Path::new("/tmp/clip.wav"), "en");
        assert!(matches!(result, Err(TranscriptionError::Model(_))));
        assert!(result.unwrap_err().to_string().contains("whisper"));
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_whisper_model_config_accessor() {
        let config = WhisperConfig {
            model_path: PathBuf::from("/my/ggml-small.bin"),
            language: "auto".to_string(),
        };
        let model = WhisperModel::load(config).unwrap();
        assert_eq!(model.config().model_path, PathBuf::from("/my/ggml-small.bin"));
        assert_eq!(model.config().language, "auto");
    }
}
