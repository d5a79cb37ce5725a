//! Session state machine.
//!
//! Enforces valid state transitions for the push-to-talk lifecycle:
//! - Idle -> Recording (trigger pressed)
//! - Recording -> Transcribing (trigger released)
//! - Transcribing -> Injecting (text recognized)
//! - Injecting -> Idle (text delivered or fallback taken)
//! - Recording -> Idle (shutdown while recording)
//! - Transcribing -> Idle (no audio, no speech, or model failure)

use std::fmt;

use thiserror::Error;

/// Lifecycle state of a dictation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No session. Ready for the trigger.
    #[default]
    Idle,
    /// Capturing microphone audio while the trigger is held.
    Recording,
    /// Running the speech model on the captured audio.
    Transcribing,
    /// Delivering recognized text to the focused application.
    Injecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Recording => write!(f, "Recording"),
            SessionState::Transcribing => write!(f, "Transcribing"),
            SessionState::Injecting => write!(f, "Injecting"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Recording)
                | (SessionState::Recording, SessionState::Transcribing)
                | (SessionState::Transcribing, SessionState::Injecting)
                | (SessionState::Injecting, SessionState::Idle)
                // Early exits
                | (SessionState::Recording, SessionState::Idle)
                | (SessionState::Transcribing, SessionState::Idle)
        )
    }

    /// Whether a session is in progress.
    pub fn is_active(&self) -> bool {
        *self != SessionState::Idle
    }
}

/// A transition the state machine refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// State machine owned by the session controller.
///
/// Handlers run serially on one thread, so transitions take `&mut self`
/// and need no locking.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: SessionState,
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    pub fn current(&self) -> SessionState {
        self.state
    }

    /// Attempt to transition to the target state.
    ///
    /// The state is unchanged when the transition is not allowed.
    pub fn transition(&mut self, target: SessionState) -> Result<(), InvalidTransition> {
        if self.state.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.state,
                to: target,
            })
        }
    }

    /// Force the state machine back to Idle.
    pub fn reset(&mut self) {
        if self.state != SessionState::Idle {
            tracing::warn!("Session state machine reset to Idle from {}", self.state);
            self.state = SessionState::Idle;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
