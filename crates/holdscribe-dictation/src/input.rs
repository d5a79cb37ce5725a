//! Global keyboard hook feeding the session controller.
//!
//! `rdev::listen` runs on its own thread and only translates raw key events
//! into [`InputEvent`]s pushed onto an [`EventQueue`]. The foreground thread
//! is the queue's single consumer, so controller handlers never overlap.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use holdscribe_core::error::HoldscribeError;
use holdscribe_core::types::TriggerKey;

/// How long to wait for the hook to report a startup failure.
const HOOK_STARTUP_GRACE: Duration = Duration::from_millis(500);

/// An event the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    TriggerPressed,
    TriggerReleased,
    ExitRequested,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("failed to start keyboard hook: {0}")]
    HookFailed(String),
}

impl From<InputError> for HoldscribeError {
    fn from(err: InputError) -> Self {
        HoldscribeError::Input(err.to_string())
    }
}

// =============================================================================
// Event queue
// =============================================================================

/// Single-consumer queue of input events.
#[derive(Debug)]
pub struct EventQueue {
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// A producer handle for the hook thread.
    pub fn sender(&self) -> Sender<InputEvent> {
        self.tx.clone()
    }

    /// Block until the next event.
    pub fn recv(&self) -> Option<InputEvent> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InputEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Events waiting to be handled.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

// =============================================================================
// Key translation
// =============================================================================

/// Map a configured trigger to the key rdev reports.
pub fn rdev_key(key: TriggerKey) -> rdev::Key {
    use rdev::Key;

    match key {
        TriggerKey::F1 => Key::F1,
        TriggerKey::F2 => Key::F2,
        TriggerKey::F3 => Key::F3,
        TriggerKey::F4 => Key::F4,
        TriggerKey::F5 => Key::F5,
        TriggerKey::F6 => Key::F6,
        TriggerKey::F7 => Key::F7,
        TriggerKey::F8 => Key::F8,
        TriggerKey::F9 => Key::F9,
        TriggerKey::F10 => Key::F10,
        TriggerKey::F11 => Key::F11,
        TriggerKey::F12 => Key::F12,
        TriggerKey::Space => Key::Space,
        TriggerKey::Alt => Key::Alt,
        TriggerKey::AltRight => Key::AltGr,
        TriggerKey::Ctrl => Key::ControlLeft,
        TriggerKey::CtrlRight => Key::ControlRight,
        TriggerKey::Cmd => Key::MetaLeft,
        TriggerKey::CmdRight => Key::MetaRight,
        TriggerKey::Shift => Key::ShiftLeft,
        TriggerKey::ShiftRight => Key::ShiftRight,
        TriggerKey::CapsLock => Key::CapsLock,
        TriggerKey::Tab => Key::Tab,
        TriggerKey::Home => Key::Home,
        TriggerKey::End => Key::End,
        TriggerKey::PageUp => Key::PageUp,
        TriggerKey::PageDown => Key::PageDown,
        TriggerKey::Up => Key::UpArrow,
        TriggerKey::Down => Key::DownArrow,
        TriggerKey::Left => Key::LeftArrow,
        TriggerKey::Right => Key::RightArrow,
    }
}

/// Turns raw hook events into [`InputEvent`]s.
#[derive(Debug, Clone, Copy)]
pub struct KeyTranslator {
    trigger: rdev::Key,
    exit_on_escape: bool,
}

impl KeyTranslator {
    /// `exit_on_escape` is off in background mode, where there is no
    /// terminal to return to.
    pub fn new(trigger: TriggerKey, exit_on_escape: bool) -> Self {
        Self {
            trigger: rdev_key(trigger),
            exit_on_escape,
        }
    }

    pub fn translate(&self, event: &rdev::EventType) -> Option<InputEvent> {
        match event {
            rdev::EventType::KeyPress(key) if *key == self.trigger => {
                Some(InputEvent::TriggerPressed)
            }
            rdev::EventType::KeyRelease(key) if *key == self.trigger => {
                Some(InputEvent::TriggerReleased)
            }
            rdev::EventType::KeyRelease(rdev::Key::Escape) if self.exit_on_escape => {
                Some(InputEvent::ExitRequested)
            }
            _ => None,
        }
    }
}

// =============================================================================
// Hook
// =============================================================================

/// Keeps the hook thread alive. The thread runs until process exit.
pub struct HookGuard {
    #[allow(dead_code)]
    thread_handle: JoinHandle<()>,
}

/// Start the global keyboard hook, forwarding translated events to `tx`.
///
/// `rdev::listen` blocks forever on success, so a failure is detected by
/// waiting briefly for an error from the hook thread.
pub fn spawn_hook(
    translator: KeyTranslator,
    tx: Sender<InputEvent>,
) -> Result<HookGuard, InputError> {
    let (startup_tx, startup_rx) = crossbeam_channel::bounded::<String>(1);

    let thread_handle = thread::Builder::new()
        .name("holdscribe-input".to_string())
        .spawn(move || {
            let callback = move |event: rdev::Event| {
                if let Some(input) = translator.translate(&event.event_type) {
                    tracing::trace!(?input, "Key event");
                    let _ = tx.send(input);
                }
            };
            if let Err(e) = rdev::listen(callback) {
                let _ = startup_tx.send(format!("{:?}", e));
            }
        })
        .map_err(|e| InputError::HookFailed(e.to_string()))?;

    match startup_rx.recv_timeout(HOOK_STARTUP_GRACE) {
        Ok(message) => Err(InputError::HookFailed(message)),
        Err(RecvTimeoutError::Timeout) => {
            tracing::debug!("Keyboard hook running");
            Ok(HookGuard { thread_handle })
        }
        Err(RecvTimeoutError::Disconnected) => Err(InputError::HookFailed(
            "keyboard hook thread exited unexpectedly".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
