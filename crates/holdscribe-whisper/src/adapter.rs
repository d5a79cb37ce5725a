use std::io::BufWriter;
use std::sync::Arc;

use tracing::{debug, info};

use crate::{wav, AudioPayload, SpeechModel, TranscriptionError};

/// Serializes a session's audio to a scoped WAV file and runs the model on it.
///
/// The temporary file is removed when the call returns, whether the model
/// succeeded or not.
#[derive(Clone)]
pub struct TranscriptionAdapter {
    model: Arc<dyn SpeechModel>,
    language: String,
}

impl TranscriptionAdapter {
    pub fn new(model: Arc<dyn SpeechModel>, language: &str) -> Self {
        Self {
            model,
            language: language.to_string(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Transcribe `payload`, returning trimmed text (possibly empty).
    pub fn transcribe(&self, payload: &AudioPayload) -> Result<String, TranscriptionError> {
        let mut file = tempfile::Builder::new()
            .prefix("holdscribe-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| TranscriptionError::StreamWrite(e.to_string()))?;

        wav::write_pcm16(BufWriter::new(file.as_file_mut()), payload)?;
        debug!(
            path = %file.path().display(),
            bytes = payload.len_bytes(),
            duration_secs = payload.duration_secs(),
            "Audio written for transcription"
        );

        info!("Transcribing...");
        let text = self.model.transcribe_file(file.path(), &self.language)?;
        Ok(text.trim().to_string())
    }
}

impl std::fmt::Debug for TranscriptionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionAdapter")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockSpeechModel;
    use holdscribe_core::types::AudioFormat;

    fn payload(samples: usize) -> AudioPayload {
        AudioPayload {
            pcm: vec![0; samples * 2],
            format: AudioFormat::WHISPER,
        }
    }

    #[test]
    fn test_transcribe_trims_text() {
        let model = Arc::new(MockSpeechModel::returning("  hello world \n"));
        let adapter = TranscriptionAdapter::new(model.clone(), "en");

        let text = adapter.transcribe(&payload(1600)).unwrap();
        assert_eq!(text, "hello world");

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].language, "en");
        assert_eq!(calls[0].samples, Some(1600));
    }

    #[test]
    fn test_temp_file_exists_during_call_and_removed_after() {
        let model = Arc::new(MockSpeechModel::returning("ok"));
        let adapter = TranscriptionAdapter::new(model.clone(), "en");
        adapter.transcribe(&payload(10)).unwrap();

        let call = &model.calls()[0];
        assert!(call.file_existed);
        assert_eq!(
            call.path.extension().and_then(|e| e.to_str()),
            Some("wav")
        );
        assert!(!call.path.exists());
    }

    #[test]
    fn test_temp_file_removed_on_model_failure() {
        let model = Arc::new(MockSpeechModel::failing("decoder crashed"));
        let adapter = TranscriptionAdapter::new(model.clone(), "de");

        let err = adapter.transcribe(&payload(10)).unwrap_err();
        assert_eq!(err, TranscriptionError::Model("decoder crashed".to_string()));

        let call = &model.calls()[0];
        assert_eq!(call.language, "de");
        assert!(call.file_existed);
        assert!(!call.path.exists());
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let model = Arc::new(MockSpeechModel::returning("   "));
        let adapter = TranscriptionAdapter::new(model, "en");
        assert_eq!(adapter.transcribe(&payload(10)).unwrap(), "");
    }
}
