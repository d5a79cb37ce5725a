use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HoldscribeError;

// =============================================================================
// Audio format
// =============================================================================

/// PCM layout shared by the capture channel and the transcription adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Bytes per sample (2 for 16-bit PCM).
    pub sample_width: u16,
    /// Samples per channel in one captured frame.
    pub frames_per_buffer: usize,
}

impl AudioFormat {
    /// Mono, 16-bit, 16 kHz: the input format Whisper models expect.
    pub const WHISPER: AudioFormat = AudioFormat {
        sample_rate: 16_000,
        channels: 1,
        sample_width: 2,
        frames_per_buffer: 1024,
    };

    /// Size in bytes of one captured frame.
    pub fn frame_bytes(&self) -> usize {
        self.frames_per_buffer * self.channels as usize * self.sample_width as usize
    }

    /// Duration in seconds represented by `bytes` of PCM in this format.
    pub fn duration_secs(&self, bytes: usize) -> f32 {
        let bytes_per_second =
            self.sample_rate as usize * self.channels as usize * self.sample_width as usize;
        if bytes_per_second == 0 {
            return 0.0;
        }
        bytes as f32 / bytes_per_second as f32
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::WHISPER
    }
}

// =============================================================================
// Model size
// =============================================================================

/// Whisper model size, trading accuracy for speed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSize {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub const ALL: [ModelSize; 5] = [
        ModelSize::Tiny,
        ModelSize::Base,
        ModelSize::Small,
        ModelSize::Medium,
        ModelSize::Large,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }

    /// File name of the GGML model for this size.
    pub fn ggml_file_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "ggml-tiny.bin",
            ModelSize::Base => "ggml-base.bin",
            ModelSize::Small => "ggml-small.bin",
            ModelSize::Medium => "ggml-medium.bin",
            ModelSize::Large => "ggml-large-v3.bin",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = HoldscribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelSize::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                HoldscribeError::Config(format!(
                    "Unknown model size '{}' (expected tiny, base, small, medium or large)",
                    s
                ))
            })
    }
}

// =============================================================================
// Trigger key
// =============================================================================

/// The key whose press/release brackets a dictation session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKey {
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Space,
    Alt,
    #[default]
    AltRight,
    Ctrl,
    CtrlRight,
    Cmd,
    CmdRight,
    Shift,
    ShiftRight,
    CapsLock,
    Tab,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
}

impl TriggerKey {
    /// Parse a symbolic key name such as `f9`, `alt_r` or `right_ctrl`.
    ///
    /// Returns `None` for unrecognized names; see [`TriggerKey::parse_or_default`].
    pub fn parse(name: &str) -> Option<Self> {
        let key = match name.trim().to_ascii_lowercase().as_str() {
            "f1" => TriggerKey::F1,
            "f2" => TriggerKey::F2,
            "f3" => TriggerKey::F3,
            "f4" => TriggerKey::F4,
            "f5" => TriggerKey::F5,
            "f6" => TriggerKey::F6,
            "f7" => TriggerKey::F7,
            "f8" => TriggerKey::F8,
            "f9" => TriggerKey::F9,
            "f10" => TriggerKey::F10,
            "f11" => TriggerKey::F11,
            "f12" => TriggerKey::F12,
            "space" => TriggerKey::Space,
            "alt" => TriggerKey::Alt,
            "alt_r" | "right_alt" => TriggerKey::AltRight,
            "ctrl" => TriggerKey::Ctrl,
            "ctrl_r" | "right_ctrl" => TriggerKey::CtrlRight,
            "cmd" => TriggerKey::Cmd,
            "cmd_r" | "right_cmd" => TriggerKey::CmdRight,
            "shift" => TriggerKey::Shift,
            "shift_r" | "right_shift" => TriggerKey::ShiftRight,
            "caps_lock" => TriggerKey::CapsLock,
            "tab" => TriggerKey::Tab,
            "home" => TriggerKey::Home,
            "end" => TriggerKey::End,
            "page_up" => TriggerKey::PageUp,
            "page_down" => TriggerKey::PageDown,
            "up" => TriggerKey::Up,
            "down" => TriggerKey::Down,
            "left" => TriggerKey::Left,
            "right" => TriggerKey::Right,
            _ => return None,
        };
        Some(key)
    }

    /// Parse a key name, falling back to the default trigger (`alt_r`).
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(
                key = %name,
                fallback = %TriggerKey::default(),
                "Unrecognized trigger key, using default"
            );
            TriggerKey::default()
        })
    }

    /// Canonical symbolic name, accepted by [`TriggerKey::parse`].
    pub fn name(&self) -> &'static str {
        match self {
            TriggerKey::F1 => "f1",
            TriggerKey::F2 => "f2",
            TriggerKey::F3 => "f3",
            TriggerKey::F4 => "f4",
            TriggerKey::F5 => "f5",
            TriggerKey::F6 => "f6",
            TriggerKey::F7 => "f7",
            TriggerKey::F8 => "f8",
            TriggerKey::F9 => "f9",
            TriggerKey::F10 => "f10",
            TriggerKey::F11 => "f11",
            TriggerKey::F12 => "f12",
            TriggerKey::Space => "space",
            TriggerKey::Alt => "alt",
            TriggerKey::AltRight => "alt_r",
            TriggerKey::Ctrl => "ctrl",
            TriggerKey::CtrlRight => "ctrl_r",
            TriggerKey::Cmd => "cmd",
            TriggerKey::CmdRight => "cmd_r",
            TriggerKey::Shift => "shift",
            TriggerKey::ShiftRight => "shift_r",
            TriggerKey::CapsLock => "caps_lock",
            TriggerKey::Tab => "tab",
            TriggerKey::Home => "home",
            TriggerKey::End => "end",
            TriggerKey::PageUp => "page_up",
            TriggerKey::PageDown => "page_down",
            TriggerKey::Up => "up",
            TriggerKey::Down => "down",
            TriggerKey::Left => "left",
            TriggerKey::Right => "right",
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_format() {
        let format = AudioFormat::WHISPER;
        assert_eq!(format.sample_rate, 16_000);
        assert_eq!(format.channels, 1);
        assert_eq!(format.sample_width, 2);
        assert_eq!(format.frame_bytes(), 2048);
        assert_eq!(AudioFormat::default(), AudioFormat::WHISPER);
    }

    #[test]
    fn test_duration_secs() {
        let format = AudioFormat::WHISPER;
        assert!((format.duration_secs(32_000) - 1.0).abs() < f32::EPSILON);
        assert_eq!(format.duration_secs(0), 0.0);
    }

    #[test]
    fn test_model_size_parse() {
        assert_eq!("tiny".parse::<ModelSize>().unwrap(), ModelSize::Tiny);
        assert_eq!("LARGE".parse::<ModelSize>().unwrap(), ModelSize::Large);
        assert!("huge".parse::<ModelSize>().is_err());
        assert_eq!(ModelSize::default(), ModelSize::Base);
    }

    #[test]
    fn test_model_size_file_names() {
        assert_eq!(ModelSize::Base.ggml_file_name(), "ggml-base.bin");
        assert_eq!(ModelSize::Large.ggml_file_name(), "ggml-large-v3.bin");
    }

    #[test]
    fn test_trigger_key_aliases() {
        assert_eq!(TriggerKey::parse("alt_r"), Some(TriggerKey::AltRight));
        assert_eq!(TriggerKey::parse("right_alt"), Some(TriggerKey::AltRight));
        assert_eq!(TriggerKey::parse("RIGHT_CTRL"), Some(TriggerKey::CtrlRight));
        assert_eq!(TriggerKey::parse(" f9 "), Some(TriggerKey::F9));
        assert_eq!(TriggerKey::parse("page_down"), Some(TriggerKey::PageDown));
    }

    #[test]
    fn test_trigger_key_fallback() {
        assert_eq!(TriggerKey::parse("hyper"), None);
        assert_eq!(TriggerKey::parse_or_default("hyper"), TriggerKey::AltRight);
        assert_eq!(TriggerKey::parse_or_default("f5"), TriggerKey::F5);
    }

    #[test]
    fn test_trigger_key_name_parses_back() {
        for name in ["f1", "f12", "space", "alt_r", "cmd_r", "caps_lock", "left"] {
            let key = TriggerKey::parse(name).unwrap();
            assert_eq!(key.name(), name);
        }
    }
}
