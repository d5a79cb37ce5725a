//! CLI argument definitions for the `holdscribe` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use holdscribe_core::config::HoldscribeConfig;
use holdscribe_core::types::ModelSize;

/// HoldScribe: hold a key, speak, release, and the words are typed for you.
#[derive(Parser, Debug)]
#[command(name = "holdscribe", version, about)]
pub struct CliArgs {
    /// Trigger key (f1-f12, space, alt, alt_r, ctrl, ctrl_r, cmd, cmd_r,
    /// shift, shift_r, caps_lock, tab, home, end, page_up, page_down, arrows).
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// Speech model size (tiny, base, small, medium, large).
    #[arg(short = 'm', long = "model")]
    pub model: Option<ModelSize>,

    /// Detach from the terminal and keep running in the background.
    #[arg(long = "background")]
    pub background: bool,

    /// Alias of --background.
    #[arg(long = "daemon")]
    pub daemon: bool,

    /// Ask for confirmation before every recording.
    #[arg(long = "prompt-permissions")]
    pub prompt_permissions: bool,

    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Directory holding ggml model files.
    #[arg(long = "model-dir")]
    pub model_dir: Option<PathBuf>,

    /// Language code passed to the speech model.
    #[arg(long = "language")]
    pub language: Option<String>,

    /// Set on the child process spawned by --background.
    #[arg(long = "detached", hide = true)]
    pub detached: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > HOLDSCRIBE_CONFIG env var > ~/.holdscribe/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("HOLDSCRIBE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Whether the user asked to detach from the terminal.
    ///
    /// Never true for the detached child itself.
    pub fn wants_detach(&self) -> bool {
        (self.background || self.daemon) && !self.detached
    }

    /// Whether this process runs without a terminal to talk to.
    pub fn is_background(&self) -> bool {
        self.detached
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut HoldscribeConfig) {
        if let Some(ref key) = self.key {
            config.trigger.key = key.clone();
        }
        if let Some(size) = self.model {
            config.model.size = size;
        }
        if let Some(ref dir) = self.model_dir {
            config.model.model_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref language) = self.language {
            config.model.language = language.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if self.prompt_permissions {
            config.session.prompt_permissions = true;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".holdscribe").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".holdscribe").join("config.toml");
    }
    PathBuf::from("config.toml")
}
