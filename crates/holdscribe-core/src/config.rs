use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{AudioFormat, ModelSize, TriggerKey};

/// Top-level configuration for HoldScribe.
///
/// Loaded from `~/.holdscribe/config.toml` by default. Command-line flags are
/// applied on top by the launcher; after startup the configuration is
/// immutable for the lifetime of the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoldscribeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub injection: InjectionConfig,
}

impl HoldscribeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Audio values that cannot describe a stream are reset to their defaults
    /// and described in the returned notes. Nothing is logged here because the
    /// log level itself comes from this file.
    pub fn load(path: &Path) -> Result<(Self, Vec<String>)> {
        let content = std::fs::read_to_string(path)?;
        let mut config: HoldscribeConfig = toml::from_str(&content)?;
        let notes = config.audio.normalize();
        Ok((config, notes))
    }

    /// The configured trigger key, falling back to `alt_r` for unknown names.
    pub fn trigger_key(&self) -> TriggerKey {
        TriggerKey::parse_or_default(&self.trigger.key)
    }

    /// The PCM format requested from the microphone.
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            sample_width: 2,
            frames_per_buffer: self.audio.frames_per_buffer,
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Trigger key configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Symbolic key name (f1-f12, alt_r, ctrl_r, space, ...).
    pub key: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            key: TriggerKey::default().name().to_string(),
        }
    }
}

/// Speech model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model size: tiny, base, small, medium, large.
    pub size: ModelSize,
    /// Target language passed to the model.
    pub language: String,
    /// Directory holding `ggml-<size>.bin` files.
    pub model_dir: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            size: ModelSize::Base,
            language: "en".to_string(),
            model_dir: "~/.holdscribe/models".to_string(),
        }
    }
}

impl ModelConfig {
    /// Full path of the model file for the configured size, with `~` expanded.
    pub fn model_path(&self) -> PathBuf {
        expand_home(&self.model_dir).join(self.size.ggml_file_name())
    }
}

/// Session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Ask for confirmation before every recording.
    pub prompt_permissions: bool,
    /// How long to wait for the capture worker after release, in milliseconds.
    pub join_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt_permissions: false,
            join_timeout_ms: 2000,
        }
    }
}

impl SessionConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Microphone configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels (1 = mono).
    pub channels: u16,
    /// Samples per channel in one captured frame.
    pub frames_per_buffer: usize,
    /// Substring of the input device name, or "default".
    pub device_name: String,
}

impl AudioConfig {
    /// Reset zero sample rate, channel count or buffer size to the defaults.
    /// Returns one note per reset field.
    pub fn normalize(&mut self) -> Vec<String> {
        let defaults = Self::default();
        let mut notes = Vec::new();
        if self.sample_rate == 0 {
            self.sample_rate = defaults.sample_rate;
            notes.push(format!("audio.sample_rate is 0, using {}", self.sample_rate));
        }
        if self.channels == 0 {
            self.channels = defaults.channels;
            notes.push(format!("audio.channels is 0, using {}", self.channels));
        }
        if self.frames_per_buffer == 0 {
            self.frames_per_buffer = defaults.frames_per_buffer;
            notes.push(format!(
                "audio.frames_per_buffer is 0, using {}",
                self.frames_per_buffer
            ));
        }
        notes
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        let format = AudioFormat::WHISPER;
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            frames_per_buffer: format.frames_per_buffer,
            device_name: "default".to_string(),
        }
    }
}

/// Text injection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// "auto", "keystrokes", "paste" or "clipboard".
    pub method: String,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            method: "auto".to_string(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"))
    {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}
