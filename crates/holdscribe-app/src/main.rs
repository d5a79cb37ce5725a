//! HoldScribe application binary - composition root.
//!
//! 1. Parse the command line and load configuration from TOML
//! 2. Detach into the background when asked (macOS)
//! 3. Check input-monitoring permission
//! 4. Build the microphone, speech model and injector
//! 5. Start the keyboard hook and run the session controller on this thread

mod cli;
mod detach;
mod permission;

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use holdscribe_audio::CpalMicrophone;
use holdscribe_core::config::HoldscribeConfig;
use holdscribe_core::error::Result;
use holdscribe_dictation::input::spawn_hook;
use holdscribe_dictation::{
    ControllerConfig, EventQueue, InjectionMethod, Injector, KeyTranslator, SessionController,
};
use holdscribe_whisper::{TranscriptionAdapter, WhisperConfig, WhisperModel};

use crate::cli::CliArgs;
use crate::permission::InteractiveGate;

/// Load the config file before the subscriber exists. Problems are handed
/// back as notes so they can be reported once logging is up.
fn read_config(path: &Path) -> (HoldscribeConfig, Vec<String>) {
    if !path.exists() {
        return (HoldscribeConfig::default(), Vec::new());
    }
    match HoldscribeConfig::load(path) {
        Ok(loaded) => loaded,
        Err(e) => (
            HoldscribeConfig::default(),
            vec![format!("{}, using defaults", e)],
        ),
    }
}

/// `RUST_LOG` wins over the resolved level.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

fn run(args: &CliArgs, config: &HoldscribeConfig) -> Result<()> {
    let background = args.is_background();
    let interactive = !background && std::io::stdin().is_terminal();

    permission::startup_check(interactive)?;

    let trigger = config.trigger_key();

    let model = WhisperModel::load(WhisperConfig::from(&config.model))?;
    if WhisperModel::has_backend() {
        tracing::info!(
            model = %config.model.size,
            language = %config.model.language,
            "Speech model ready"
        );
    } else {
        tracing::warn!(
            "Speech recognition is not compiled in; every recording will be empty. \
             Rebuild with `--features whisper` to transcribe"
        );
    }
    let adapter = TranscriptionAdapter::new(Arc::new(model), &config.model.language);

    let microphone = Arc::new(CpalMicrophone::new(&config.audio.device_name));
    let injector = Injector::system(InjectionMethod::from_config(&config.injection.method));
    tracing::debug!(method = injector.method().as_str(), "Text injection configured");

    let mut controller = SessionController::new(
        ControllerConfig::from_config(config, background),
        microphone,
        adapter,
        Box::new(injector),
    );
    if config.session.prompt_permissions && interactive {
        controller = controller.with_permission_gate(Box::new(InteractiveGate::new(trigger)));
    }

    let events = EventQueue::new();
    let _hook = spawn_hook(KeyTranslator::new(trigger, !background), events.sender())?;

    tracing::info!("HoldScribe v{} ready", env!("CARGO_PKG_VERSION"));
    if background {
        tracing::info!(key = %trigger, "Hold the trigger key to dictate");
    } else {
        tracing::info!(key = %trigger, "Hold the trigger key to dictate, press Esc to quit");
    }

    controller.run(&events);
    tracing::info!("HoldScribe stopped");
    Ok(())
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.wants_detach() {
        return match detach::spawn_detached() {
            Ok(pid) => {
                println!("HoldScribe running in the background (PID {})", pid);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config_path = args.resolve_config_path();
    let (mut config, notes) = read_config(&config_path);
    args.apply_overrides(&mut config);

    init_tracing(&config.general.log_level);
    for note in &notes {
        tracing::warn!(path = %config_path.display(), "Config: {}", note);
    }
    tracing::debug!(path = %config_path.display(), "Configuration resolved");

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "HoldScribe cannot start");
            ExitCode::FAILURE
        }
    }
}
