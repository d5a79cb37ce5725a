//! HoldScribe Dictation crate - push-to-talk session control and text delivery.
//!
//! Provides the session controller that takes a dictation session through a
//! strict state machine: Idle -> Recording -> Transcribing -> Injecting -> Idle.
//! Key events arrive from a global hook through a single-consumer queue, so the
//! controller is driven from one thread and needs no locking.

pub mod controller;
pub mod inject;
pub mod input;
pub mod permission;
pub mod state;

pub use controller::{ControllerConfig, ListenerControl, Session, SessionController, SessionOutcome};
pub use inject::{InjectionError, InjectionMethod, InjectionOutcome, Injector, TextInjector};
pub use input::{EventQueue, InputError, InputEvent, KeyTranslator};
pub use permission::{
    is_input_monitoring_trusted, request_input_monitoring_trust, PermissionGate,
};
pub use state::{SessionState, StateMachine};
