//! Text injection into the focused application.
//!
//! One [`InjectionMethod`] is chosen at startup: synthesized keystrokes
//! (`osascript` on macOS, `xdotool` on Linux), the paste shortcut (clipboard
//! write plus Ctrl/Cmd+V through enigo), or clipboard only. If the direct
//! mechanism fails the text is left on the clipboard so the user can paste it
//! manually.

#[cfg(any(target_os = "macos", target_os = "linux"))]
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use holdscribe_core::error::HoldscribeError;

/// How long to let the clipboard settle before sending the paste shortcut.
const PASTE_SETTLE_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// Types
// =============================================================================

/// Mechanism used to deliver text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionMethod {
    /// Type the text as synthesized keystrokes.
    Keystrokes,
    /// Put the text on the clipboard and send the paste shortcut.
    PasteShortcut,
    /// Only put the text on the clipboard.
    ClipboardOnly,
}

impl InjectionMethod {
    /// The default mechanism for the host platform.
    pub fn for_platform() -> Self {
        if cfg!(any(target_os = "macos", target_os = "linux")) {
            InjectionMethod::Keystrokes
        } else {
            InjectionMethod::PasteShortcut
        }
    }

    /// Parse a configured method name; `auto` and unknown names select
    /// [`InjectionMethod::for_platform`].
    pub fn from_config(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "keystrokes" | "type" => InjectionMethod::Keystrokes,
            "paste" => InjectionMethod::PasteShortcut,
            "clipboard" => InjectionMethod::ClipboardOnly,
            "auto" | "" => Self::for_platform(),
            other => {
                warn!(method = %other, "Unknown injection method, using platform default");
                Self::for_platform()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionMethod::Keystrokes => "keystrokes",
            InjectionMethod::PasteShortcut => "paste",
            InjectionMethod::ClipboardOnly => "clipboard",
        }
    }
}

/// What happened to the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// The text reached the focused application.
    Injected,
    /// The text is on the clipboard and must be pasted manually.
    CopiedToClipboard,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    #[error("direct injection failed: {0}")]
    Direct(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

impl From<InjectionError> for HoldscribeError {
    fn from(err: InjectionError) -> Self {
        HoldscribeError::Injection(err.to_string())
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Delivers recognized text to the user.
pub trait TextInjector: Send {
    fn inject(&mut self, text: &str) -> Result<InjectionOutcome, InjectionError>;
}

/// Synthesizes keyboard input.
pub trait KeystrokeSink: Send {
    /// Type `text` into the focused application.
    fn type_text(&mut self, text: &str) -> Result<(), InjectionError>;

    /// Send the platform paste shortcut.
    fn paste_shortcut(&mut self) -> Result<(), InjectionError>;
}

/// Writes to the system clipboard.
pub trait ClipboardSink: Send {
    fn set_text(&mut self, text: &str) -> Result<(), InjectionError>;
}

// =============================================================================
// Injector
// =============================================================================

/// [`TextInjector`] that applies one method and falls back to the clipboard.
pub struct Injector {
    method: InjectionMethod,
    keys: Box<dyn KeystrokeSink>,
    clipboard: Box<dyn ClipboardSink>,
    settle_delay: Duration,
}

impl Injector {
    pub fn new(
        method: InjectionMethod,
        keys: Box<dyn KeystrokeSink>,
        clipboard: Box<dyn ClipboardSink>,
    ) -> Self {
        Self {
            method,
            keys,
            clipboard,
            settle_delay: PASTE_SETTLE_DELAY,
        }
    }

    /// Injector backed by the real OS keyboard and clipboard.
    pub fn system(method: InjectionMethod) -> Self {
        Self::new(
            method,
            Box::new(SystemKeystrokes),
            Box::new(SystemClipboard::default()),
        )
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn method(&self) -> InjectionMethod {
        self.method
    }

    fn inject_direct(&mut self, text: &str) -> Result<(), InjectionError> {
        match self.method {
            InjectionMethod::Keystrokes => self.keys.type_text(text),
            InjectionMethod::PasteShortcut => {
                self.clipboard.set_text(text)?;
                thread::sleep(self.settle_delay);
                self.keys.paste_shortcut()
            }
            InjectionMethod::ClipboardOnly => Ok(()),
        }
    }
}

impl TextInjector for Injector {
    fn inject(&mut self, text: &str) -> Result<InjectionOutcome, InjectionError> {
        if self.method == InjectionMethod::ClipboardOnly {
            self.clipboard.set_text(text)?;
            return Ok(InjectionOutcome::CopiedToClipboard);
        }

        match self.inject_direct(text) {
            Ok(()) => {
                debug!(method = self.method.as_str(), chars = text.chars().count(), "Text injected");
                Ok(InjectionOutcome::Injected)
            }
            Err(e) => {
                warn!(error = %e, method = self.method.as_str(), "Direct injection failed, falling back to clipboard");
                self.clipboard.set_text(text)?;
                Ok(InjectionOutcome::CopiedToClipboard)
            }
        }
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("method", &self.method)
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// OS backends
// =============================================================================

/// Keystrokes through the platform's own tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemKeystrokes;

impl KeystrokeSink for SystemKeystrokes {
    #[cfg(target_os = "macos")]
    fn type_text(&mut self, text: &str) -> Result<(), InjectionError> {
        let script = format!(
            "tell application \"System Events\" to keystroke \"{}\"",
            escape_applescript(text)
        );
        run_command(Command::new("osascript").arg("-e").arg(script))
    }

    #[cfg(target_os = "linux")]
    fn type_text(&mut self, text: &str) -> Result<(), InjectionError> {
        run_command(Command::new("xdotool").args(["type", "--"]).arg(text))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    fn type_text(&mut self, text: &str) -> Result<(), InjectionError> {
        use enigo::Keyboard;

        let mut enigo = new_enigo()?;
        enigo
            .text(text)
            .map_err(|e| InjectionError::Direct(format!("Failed to type text: {}", e)))
    }

    fn paste_shortcut(&mut self) -> Result<(), InjectionError> {
        use enigo::{Direction, Key, Keyboard};

        let modifier = if cfg!(target_os = "macos") {
            Key::Meta
        } else {
            Key::Control
        };

        let mut enigo = new_enigo()?;
        let to_error = |e: enigo::InputError| InjectionError::Direct(format!("Paste shortcut failed: {}", e));
        enigo.key(modifier, Direction::Press).map_err(to_error)?;
        let click = enigo.key(Key::Unicode('v'), Direction::Click).map_err(to_error);
        // Always release the modifier, even if the click failed.
        enigo.key(modifier, Direction::Release).map_err(to_error)?;
        click
    }
}

fn new_enigo() -> Result<enigo::Enigo, InjectionError> {
    enigo::Enigo::new(&enigo::Settings::default())
        .map_err(|e| InjectionError::Direct(format!("Failed to connect to input system: {}", e)))
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn run_command(command: &mut Command) -> Result<(), InjectionError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = command
        .output()
        .map_err(|e| InjectionError::Direct(format!("Failed to run {}: {}", program, e)))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(InjectionError::Direct(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Escape text for use inside an AppleScript string literal.
pub fn escape_applescript(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(ch),
        }
    }
    escaped
}

type ClipboardRequest = (String, Sender<Result<(), InjectionError>>);

/// The system clipboard via arboard.
///
/// A single owner thread holds the arboard handle for the life of the sink.
/// On X11 and Wayland the clipboard contents are served by that handle, so
/// it must outlive the paste that follows the write.
#[derive(Debug, Default)]
pub struct SystemClipboard {
    requests: Option<Sender<ClipboardRequest>>,
}

impl SystemClipboard {
    fn owner(&mut self) -> Result<&Sender<ClipboardRequest>, InjectionError> {
        if self.requests.is_none() {
            let (tx, rx) = crossbeam_channel::unbounded();
            thread::Builder::new()
                .name("holdscribe-clipboard".to_string())
                .spawn(move || {
                    serve_clipboard(
                        rx,
                        || arboard::Clipboard::new().map_err(|e| e.to_string()),
                        |clipboard, text| clipboard.set_text(text).map_err(|e| e.to_string()),
                    )
                })
                .map_err(|e| {
                    InjectionError::Clipboard(format!("Failed to start clipboard thread: {}", e))
                })?;
            self.requests = Some(tx);
        }
        self.requests
            .as_ref()
            .ok_or_else(|| InjectionError::Clipboard("clipboard thread unavailable".to_string()))
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), InjectionError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let sent = self.owner()?.send((text.to_string(), reply_tx));
        if sent.is_err() {
            self.requests = None;
            return Err(InjectionError::Clipboard(
                "clipboard thread stopped".to_string(),
            ));
        }
        reply_rx.recv().map_err(|_| {
            InjectionError::Clipboard("clipboard thread stopped".to_string())
        })??;
        info!("Text copied to clipboard");
        Ok(())
    }
}

/// Owner loop: open the clipboard on first use, keep it open, and apply each
/// write. A failed open is retried on the next request.
fn serve_clipboard<C>(
    requests: Receiver<ClipboardRequest>,
    mut open: impl FnMut() -> Result<C, String>,
    mut write: impl FnMut(&mut C, &str) -> Result<(), String>,
) {
    let mut clipboard: Option<C> = None;
    for (text, reply) in requests {
        if clipboard.is_none() {
            match open() {
                Ok(c) => clipboard = Some(c),
                Err(e) => {
                    let _ = reply.send(Err(InjectionError::Clipboard(format!(
                        "Failed to access clipboard: {}",
                        e
                    ))));
                    continue;
                }
            }
        }
        let result = match clipboard.as_mut() {
            Some(c) => write(c, &text)
                .map_err(|e| InjectionError::Clipboard(format!("Failed to copy text: {}", e))),
            None => Err(InjectionError::Clipboard("clipboard unavailable".to_string())),
        };
        let _ = reply.send(result);
    }
    debug!("Clipboard owner stopped");
}

// =============================================================================
// Mock implementations
// =============================================================================

/// Keystroke sink that records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct MockKeystrokes {
    fail: bool,
    typed: Arc<Mutex<Vec<String>>>,
    pastes: Arc<Mutex<usize>>,
}

impl MockKeystrokes {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn typed(&self) -> Vec<String> {
        self.typed.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn pastes(&self) -> usize {
        self.pastes.lock().map(|p| *p).unwrap_or(0)
    }
}

impl KeystrokeSink for MockKeystrokes {
    fn type_text(&mut self, text: &str) -> Result<(), InjectionError> {
        if self.fail {
            return Err(InjectionError::Direct("keystrokes unavailable".to_string()));
        }
        if let Ok(mut typed) = self.typed.lock() {
            typed.push(text.to_string());
        }
        Ok(())
    }

    fn paste_shortcut(&mut self) -> Result<(), InjectionError> {
        if self.fail {
            return Err(InjectionError::Direct("keystrokes unavailable".to_string()));
        }
        if let Ok(mut pastes) = self.pastes.lock() {
            *pastes += 1;
        }
        Ok(())
    }
}

/// Clipboard that records every write.
#[derive(Debug, Clone, Default)]
pub struct MockClipboard {
    fail: bool,
    contents: Arc<Mutex<Vec<String>>>,
}

impl MockClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every text written, oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.contents.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ClipboardSink for MockClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), InjectionError> {
        if self.fail {
            return Err(InjectionError::Clipboard("no clipboard".to_string()));
        }
        if let Ok(mut contents) = self.contents.lock() {
            contents.push(text.to_string());
        }
        Ok(())
    }
}

/// Injector that records texts and returns a fixed result.
#[derive(Debug, Clone)]
pub struct RecordingInjector {
    result: Result<InjectionOutcome, InjectionError>,
    texts: Arc<Mutex<Vec<String>>>,
}

impl Default for RecordingInjector {
    fn default() -> Self {
        Self::returning(InjectionOutcome::Injected)
    }
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(outcome: InjectionOutcome) -> Self {
        Self {
            result: Ok(outcome),
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(error: InjectionError) -> Self {
        Self {
            result: Err(error),
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.texts.lock().map(|t| t.len()).unwrap_or(0)
    }
}

impl TextInjector for RecordingInjector {
    fn inject(&mut self, text: &str) -> Result<InjectionOutcome, InjectionError> {
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
        self.result.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
