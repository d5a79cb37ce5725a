//! Real microphone capture via cpal.
//!
//! Opens the device at its preferred configuration and converts every
//! callback buffer to the requested format (downmix, linear resample,
//! f32 -> i16) before handing samples to the reader over a channel.
//! Only a lost device ends the stream; backend glitches such as overruns are
//! logged and capture continues.

use std::collections::VecDeque;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use holdscribe_core::dsp::LinearResampler;
use holdscribe_core::types::AudioFormat;

use crate::{CaptureError, FrameReader, MicrophoneSource};

/// How long a read waits for the device before reporting a stall.
const STALL_TIMEOUT: Duration = Duration::from_secs(5);

type SampleMessage = Result<Vec<i16>, String>;

/// Microphone backed by the default cpal host.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    /// Substring of the input device name, or "default".
    device_name: String,
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new("default")
    }
}

impl CpalMicrophone {
    pub fn new(device_name: &str) -> Self {
        Self {
            device_name: device_name.to_string(),
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn select_device(&self, host: &cpal::Host) -> Result<cpal::Device, CaptureError> {
        if self.device_name == "default" {
            return host
                .default_input_device()
                .ok_or_else(|| CaptureError::Open("No default input device found".into()));
        }

        let name_lower = self.device_name.to_lowercase();
        host.input_devices()
            .map_err(|e| CaptureError::Open(format!("Failed to enumerate devices: {}", e)))?
            .find(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&name_lower))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                CaptureError::Open(format!("Audio device '{}' not found", self.device_name))
            })
    }
}

impl MicrophoneSource for CpalMicrophone {
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn FrameReader>, CaptureError> {
        let host = cpal::default_host();
        let device = self.select_device(&host)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        debug!(device = %device_name, "Selected audio device");

        // Many devices reject arbitrary rates and channel counts, so capture
        // at the device's own config and convert in the callback.
        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::Open(format!("Failed to query input config: {}", e)))?;
        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let device_rate = stream_config.sample_rate.0;
        let device_channels = stream_config.channels;
        let conversion = Conversion::new(
            device_rate,
            device_channels,
            format.sample_rate,
            format.channels,
        );
        if conversion.is_needed() {
            info!(
                "Audio callback will downmix/resample: {}ch {}Hz -> {}ch {}Hz",
                device_channels, device_rate, format.channels, format.sample_rate
            );
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, conversion, tx),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, conversion, tx),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, conversion, tx),
            other => {
                return Err(CaptureError::Open(format!(
                    "Unsupported sample format {:?}",
                    other
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| CaptureError::Open(format!("Failed to start audio stream: {}", e)))?;

        info!(
            device = %device_name,
            device_rate,
            device_channels,
            target_rate = format.sample_rate,
            target_channels = format.channels,
            "Audio capture started"
        );

        Ok(Box::new(CpalReader {
            _stream: stream,
            rx,
            pending: VecDeque::new(),
            frame_samples: format.frames_per_buffer * format.channels as usize,
        }))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut conversion: Conversion,
    tx: Sender<SampleMessage>,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    use cpal::Sample;

    let err_tx = tx.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
                let _ = tx.send(Ok(conversion.apply(&samples)));
            },
            move |err| {
                if is_fatal_stream_error(&err) {
                    error!("Audio stream error: {}", err);
                    let _ = err_tx.send(Err(err.to_string()));
                } else {
                    warn!("Audio stream glitch, still recording: {}", err);
                }
            },
            None,
        )
        .map_err(|e| CaptureError::Open(format!("Failed to build audio stream: {}", e)))
}

/// Whether a stream error means no more audio will arrive.
///
/// Backend-specific errors (ALSA xruns, POLLERR) leave the stream running.
fn is_fatal_stream_error(err: &cpal::StreamError) -> bool {
    matches!(err, cpal::StreamError::DeviceNotAvailable)
}

struct CpalReader {
    // Dropping the stream stops the device callback.
    _stream: cpal::Stream,
    rx: Receiver<SampleMessage>,
    pending: VecDeque<i16>,
    frame_samples: usize,
}

impl FrameReader for CpalReader {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        while self.pending.len() < self.frame_samples {
            match self.rx.recv_timeout(STALL_TIMEOUT) {
                Ok(Ok(samples)) => self.pending.extend(samples),
                Ok(Err(message)) => return Err(CaptureError::Read(message)),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(CaptureError::Read(format!(
                        "no audio from device for {}s",
                        STALL_TIMEOUT.as_secs()
                    )))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::Read("audio stream closed".into()))
                }
            }
        }

        let frame: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
        Ok(Some(frame.iter().flat_map(|s| s.to_le_bytes()).collect()))
    }
}

/// Device-to-target format conversion applied inside the callback.
///
/// Stateful: the resampler's position carries over between callback buffers.
#[derive(Debug, Clone)]
struct Conversion {
    device_channels: u16,
    target_channels: u16,
    resampler: LinearResampler,
}

impl Conversion {
    fn new(device_rate: u32, device_channels: u16, target_rate: u32, target_channels: u16) -> Self {
        Self {
            device_channels,
            target_channels,
            resampler: LinearResampler::new(device_rate, target_rate),
        }
    }

    fn is_needed(&self) -> bool {
        !self.resampler.is_passthrough() || self.device_channels != self.target_channels
    }

    fn apply(&mut self, interleaved: &[f32]) -> Vec<i16> {
        let mono = downmix(interleaved, self.device_channels);
        let resampled = self.resampler.process(&mono);
        let channels = self.target_channels.max(1) as usize;
        let mut out = Vec::with_capacity(resampled.len() * channels);
        for sample in to_pcm16(&resampled) {
            out.extend(std::iter::repeat(sample).take(channels));
        }
        out
    }
}

/// Average interleaved channels down to mono.
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let ch = channels as usize;
    interleaved
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Convert f32 samples in [-1.0, 1.0] to 16-bit PCM, clamping out-of-range
/// values.
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microphone_device_name() {
        assert_eq!(CpalMicrophone::default().device_name(), "default");
        assert_eq!(CpalMicrophone::new("USB").device_name(), "USB");
    }

    #[test]
    fn test_stereo_to_mono_downmix() {
        let stereo = vec![0.4f32, 0.6, 0.2, 0.8, 1.0, 0.0];
        let mono = downmix(&stereo, 2);
        assert_eq!(mono.len(), 3);
        assert!(mono.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_mono_downmix_is_identity() {
        let mono = vec![0.1f32, -0.2, 0.3];
        assert_eq!(downmix(&mono, 1), mono);
    }

    #[test]
    fn test_to_pcm16_clamps() {
        let pcm = to_pcm16(&[0.0, 1.0, -1.0, 2.0, -3.0]);
        assert_eq!(pcm[0], 0);
        assert_eq!(pcm[1], i16::MAX);
        assert_eq!(pcm[2], -i16::MAX);
        assert_eq!(pcm[3], i16::MAX);
        assert_eq!(pcm[4], -i16::MAX);
    }

    #[test]
    fn test_conversion_stereo_48k_to_whisper() {
        let mut conversion = Conversion::new(48_000, 2, 16_000, 1);
        assert!(conversion.is_needed());
        // 6 stereo frames -> 6 mono samples -> 2 at 16 kHz.
        let out = conversion.apply(&[0.5f32; 12]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| *s == (0.5 * i16::MAX as f32) as i16));
    }

    #[test]
    fn test_conversion_not_needed() {
        let mut conversion = Conversion::new(16_000, 1, 16_000, 1);
        assert!(!conversion.is_needed());
        assert_eq!(conversion.apply(&[0.0, 0.0]), vec![0, 0]);
    }

    #[test]
    fn test_conversion_does_not_drift_across_callbacks() {
        // 100 callbacks of 500 samples at 44.1 kHz hold 50000 samples,
        // which is 18140.6 samples at 16 kHz.
        let mut conversion = Conversion::new(44_100, 1, 16_000, 1);
        let total: usize = (0..100)
            .map(|_| conversion.apply(&[0.25f32; 500]).len())
            .sum();
        assert!((18_140..=18_141).contains(&total), "total {}", total);
    }

    #[test]
    fn test_backend_glitches_are_not_fatal() {
        assert!(is_fatal_stream_error(&cpal::StreamError::DeviceNotAvailable));

        let xrun = cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "alsa::poll() returned POLLERR".to_string(),
            },
        };
        assert!(!is_fatal_stream_error(&xrun));
    }
}
