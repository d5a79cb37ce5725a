//! WAV container helpers for 16-bit PCM.

use std::io::{Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use holdscribe_core::types::AudioFormat;

use crate::{AudioPayload, TranscriptionError};

/// WAV header describing 16-bit integer PCM in `format`.
pub fn wav_spec(format: &AudioFormat) -> WavSpec {
    WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write `payload` as a complete WAV file into `writer`.
///
/// A trailing odd byte in the PCM is ignored.
pub fn write_pcm16<W: Write + Seek>(
    writer: W,
    payload: &AudioPayload,
) -> Result<(), TranscriptionError> {
    let mut wav = WavWriter::new(writer, wav_spec(&payload.format))
        .map_err(|e| TranscriptionError::StreamWrite(e.to_string()))?;

    for chunk in payload.pcm.chunks_exact(2) {
        wav.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))
            .map_err(|e| TranscriptionError::StreamWrite(e.to_string()))?;
    }

    wav.finalize()
        .map_err(|e| TranscriptionError::StreamWrite(e.to_string()))
}

/// Read a 16-bit WAV file back into interleaved samples.
pub fn read_pcm16(path: &Path) -> Result<(Vec<i16>, WavSpec), TranscriptionError> {
    let reader = WavReader::open(path)
        .map_err(|e| TranscriptionError::Model(format!("Failed to open WAV file: {}", e)))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(TranscriptionError::Model(format!(
            "Expected 16-bit PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TranscriptionError::Model(format!("Failed to read audio samples: {}", e)))?;
    Ok((samples, spec))
}

/// Convert interleaved 16-bit samples to mono f32 in [-1.0, 1.0].
pub fn to_mono_f32(samples: &[i16], channels: u16) -> Vec<f32> {
    let ch = channels.max(1) as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|s| *s as f32 / 32768.0).sum();
            sum / ch as f32
        })
        .collect()
}
