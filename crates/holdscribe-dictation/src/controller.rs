//! Session controller driving push-to-talk dictation.
//!
//! The `SessionController` owns the state machine and every collaborator of a
//! session: the microphone, the transcription adapter, the text injector and
//! the permission gate. Input events are handled one at a time on the thread
//! that owns the controller, so handlers take `&mut self` and never lock.
//! Every adapter failure is logged and ends the session in Idle; nothing is
//! propagated out of a handler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use holdscribe_audio::{CaptureChannel, JoinOutcome, MicrophoneSource};
use holdscribe_core::config::HoldscribeConfig;
use holdscribe_core::types::AudioFormat;
use holdscribe_whisper::{AudioPayload, TranscriptionAdapter};

use crate::inject::{InjectionOutcome, TextInjector};
use crate::input::{EventQueue, InputEvent};
use crate::permission::{AllowAll, PermissionGate};
use crate::state::{SessionState, StateMachine};

/// Settings the controller needs, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// PCM format requested from the microphone.
    pub format: AudioFormat,
    /// Bound on waiting for the capture worker after release.
    pub join_timeout: Duration,
    /// Ask the permission gate before every recording.
    pub prompt_permissions: bool,
    /// Running detached; disables prompting and the exit key.
    pub background: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::WHISPER,
            join_timeout: Duration::from_secs(2),
            prompt_permissions: false,
            background: false,
        }
    }
}

impl ControllerConfig {
    pub fn from_config(config: &HoldscribeConfig, background: bool) -> Self {
        Self {
            format: config.audio_format(),
            join_timeout: config.session.join_timeout(),
            prompt_permissions: config.session.prompt_permissions,
            background,
        }
    }
}

/// An in-progress session from trigger press to injection.
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    capture: CaptureChannel,
}

impl Session {
    fn new(capture: CaptureChannel) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            capture,
        }
    }

    /// Seconds since the trigger was pressed.
    pub fn elapsed_secs(&self) -> f32 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_milliseconds() as f32 / 1000.0
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// How a trigger release was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No session was recording.
    Ignored,
    /// The microphone delivered nothing.
    NoAudio,
    /// The model returned no text.
    NoSpeech,
    /// The model or its audio file failed.
    TranscriptionFailed,
    /// Text was delivered to the focused application.
    Injected,
    /// Text was left on the clipboard for manual paste.
    CopiedToClipboard,
    /// Neither injection nor the clipboard worked.
    InjectionFailed,
}

/// Whether the event loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerControl {
    Continue,
    Stop,
}

/// The push-to-talk state machine.
pub struct SessionController {
    config: ControllerConfig,
    state: StateMachine,
    session: Option<Session>,
    microphone: Arc<dyn MicrophoneSource>,
    transcriber: TranscriptionAdapter,
    injector: Box<dyn TextInjector>,
    gate: Box<dyn PermissionGate>,
    abandoned_workers: usize,
}

impl SessionController {
    pub fn new(
        config: ControllerConfig,
        microphone: Arc<dyn MicrophoneSource>,
        transcriber: TranscriptionAdapter,
        injector: Box<dyn TextInjector>,
    ) -> Self {
        Self {
            config,
            state: StateMachine::new(),
            session: None,
            microphone,
            transcriber,
            injector,
            gate: Box::new(AllowAll),
            abandoned_workers: 0,
        }
    }

    /// Replace the gate consulted when per-session prompting is on.
    pub fn with_permission_gate(mut self, gate: Box<dyn PermissionGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Returns the current session state.
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// The session in progress, if any.
    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Capture workers that missed the join timeout since startup.
    pub fn abandoned_workers(&self) -> usize {
        self.abandoned_workers
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Dispatch one input event.
    pub fn handle(&mut self, event: InputEvent) -> ListenerControl {
        match event {
            InputEvent::TriggerPressed => {
                self.on_trigger_press();
                ListenerControl::Continue
            }
            InputEvent::TriggerReleased => {
                self.on_trigger_release();
                ListenerControl::Continue
            }
            InputEvent::ExitRequested => self.on_exit_signal(),
        }
    }

    /// Handle events until an exit is requested or the queue closes, then
    /// clean up.
    pub fn run(&mut self, events: &EventQueue) {
        while let Some(event) = events.recv() {
            if self.handle(event) == ListenerControl::Stop {
                break;
            }
        }
        self.cleanup();
    }

    /// Start recording if idle. Returns whether a session started.
    ///
    /// Presses during an active session, including key auto-repeat, are
    /// ignored.
    pub fn on_trigger_press(&mut self) -> bool {
        if self.state.current() != SessionState::Idle {
            debug!(state = %self.state.current(), "Trigger pressed during active session, ignoring");
            return false;
        }

        if self.config.prompt_permissions && !self.config.background && !self.gate.allow_session()
        {
            info!("Recording cancelled");
            return false;
        }

        let capture = match CaptureChannel::arm(Arc::clone(&self.microphone), self.config.format) {
            Ok(capture) => capture,
            Err(e) => {
                error!(error = %e, "Could not start recording");
                return false;
            }
        };

        self.advance(SessionState::Recording);
        let session = Session::new(capture);
        info!(session_id = %session.id, "Recording started");
        self.session = Some(session);
        true
    }

    /// Stop recording, transcribe, and inject. Always ends in Idle.
    pub fn on_trigger_release(&mut self) -> SessionOutcome {
        if self.state.current() != SessionState::Recording {
            debug!(state = %self.state.current(), "Trigger released without recording, ignoring");
            return SessionOutcome::Ignored;
        }
        let Some(mut session) = self.session.take() else {
            self.state.reset();
            return SessionOutcome::Ignored;
        };

        self.advance(SessionState::Transcribing);
        let frames = self.stop_capture(&mut session);
        let payload = AudioPayload::from_frames(frames, self.config.format);
        let outcome = self.process(&session, &payload);
        self.return_to_idle();

        debug!(session_id = %session.id, ?outcome, "Session finished");
        outcome
    }

    /// Ask the event loop to stop. An in-flight session is never aborted
    /// here; events are serialized, so this runs only between handlers.
    pub fn on_exit_signal(&self) -> ListenerControl {
        info!("Exit requested");
        ListenerControl::Stop
    }

    /// Stop any recording and return to Idle, discarding captured audio.
    /// Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        if let Some(mut session) = self.session.take() {
            info!(session_id = %session.id, "Stopping recording for shutdown");
            let discarded = self.stop_capture(&mut session);
            debug!(frames = discarded.len(), "Discarded captured audio");
        }
        self.return_to_idle();
    }

    /// Disarm and join the worker, then drain whatever it captured.
    fn stop_capture(&mut self, session: &mut Session) -> Vec<Vec<u8>> {
        session.capture.disarm();
        match session.capture.join(self.config.join_timeout) {
            JoinOutcome::Finished(report) => {
                if let Some(e) = &report.error {
                    warn!(
                        session_id = %session.id,
                        error = %e,
                        frames = report.frames,
                        "Recording stopped early, keeping audio captured so far"
                    );
                }
                debug!(
                    session_id = %session.id,
                    frames = report.frames,
                    bytes = report.bytes,
                    "Capture worker joined"
                );
            }
            JoinOutcome::Abandoned => {
                self.abandoned_workers += 1;
                warn!(
                    session_id = %session.id,
                    abandoned = self.abandoned_workers,
                    "Capture worker abandoned, using audio captured so far"
                );
            }
        }
        session.capture.drain()
    }

    fn process(&mut self, session: &Session, payload: &AudioPayload) -> SessionOutcome {
        if payload.is_empty() {
            info!(session_id = %session.id, "No audio captured");
            return SessionOutcome::NoAudio;
        }

        info!(
            session_id = %session.id,
            duration_secs = payload.duration_secs(),
            held_secs = session.elapsed_secs(),
            "Recording stopped"
        );

        let text = match self.transcriber.transcribe(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Transcription failed");
                return SessionOutcome::TranscriptionFailed;
            }
        };
        if text.is_empty() {
            info!(session_id = %session.id, "No speech detected");
            return SessionOutcome::NoSpeech;
        }

        info!(session_id = %session.id, text = %text, "Transcribed");
        self.advance(SessionState::Injecting);
        match self.injector.inject(&text) {
            Ok(InjectionOutcome::Injected) => {
                info!(session_id = %session.id, "Text injected");
                SessionOutcome::Injected
            }
            Ok(InjectionOutcome::CopiedToClipboard) => {
                warn!(
                    session_id = %session.id,
                    "Could not type the text; it is on the clipboard, paste it manually"
                );
                SessionOutcome::CopiedToClipboard
            }
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Could not deliver text");
                SessionOutcome::InjectionFailed
            }
        }
    }

    fn advance(&mut self, target: SessionState) {
        if let Err(e) = self.state.transition(target) {
            warn!(error = %e, "Unexpected session state");
        }
    }

    fn return_to_idle(&mut self) {
        if self.state.current() != SessionState::Idle
            && self.state.transition(SessionState::Idle).is_err()
        {
            self.state.reset();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("abandoned_workers", &self.abandoned_workers)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::{
        InjectionError, InjectionMethod, Injector, MockClipboard, MockKeystrokes,
        RecordingInjector,
    };
    use crate::permission::ScriptedGate;
    use holdscribe_audio::{MockMicrophone, ScriptEnd};
    use holdscribe_whisper::MockSpeechModel;

    const WAIT: Duration = Duration::from_secs(2);
    const FRAME_BYTES: usize = 64;

    fn frames(n: u8) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i; FRAME_BYTES]).collect()
    }

    struct Harness {
        mic: Arc<MockMicrophone>,
        model: Arc<MockSpeechModel>,
        injector: RecordingInjector,
        controller: SessionController,
    }

    fn harness_with(mic: MockMicrophone, model: MockSpeechModel, config: ControllerConfig) -> Harness {
        let mic = Arc::new(mic);
        let model = Arc::new(model);
        let injector = RecordingInjector::new();
        let controller = SessionController::new(
            config,
            mic.clone(),
            TranscriptionAdapter::new(model.clone(), "en"),
            Box::new(injector.clone()),
        );
        Harness {
            mic,
            model,
            injector,
            controller,
        }
    }

    fn harness(mic: MockMicrophone, model: MockSpeechModel) -> Harness {
        harness_with(mic, model, ControllerConfig::default())
    }

    /// Press, wait for the microphone script to run out, release.
    fn hold_and_release(h: &mut Harness) -> SessionOutcome {
        assert!(h.controller.on_trigger_press());
        assert!(h.mic.wait_exhausted(WAIT));
        h.controller.on_trigger_release()
    }

    #[test]
    fn test_idle_before_first_press() {
        let h = harness(MockMicrophone::with_frames(frames(1)), MockSpeechModel::returning("x"));
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.controller.current_session().is_none());
        assert_eq!(h.controller.abandoned_workers(), 0);
    }

    #[test]
    fn test_happy_path_injects_text() {
        let mut h = harness(
            MockMicrophone::with_frames(frames(5)),
            MockSpeechModel::returning("  hello world  "),
        );

        assert!(h.controller.on_trigger_press());
        assert_eq!(h.controller.state(), SessionState::Recording);
        assert!(h.controller.current_session().is_some());
        assert!(h.mic.wait_exhausted(WAIT));

        let outcome = h.controller.on_trigger_release();
        assert_eq!(outcome, SessionOutcome::Injected);
        assert_eq!(h.injector.texts(), vec!["hello world"]);
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.controller.current_session().is_none());

        let calls = h.model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].samples, Some(5 * FRAME_BYTES / 2));
        assert!(!calls[0].path.exists());
        assert_eq!(h.mic.opens(), 1);
        assert_eq!(h.mic.closes(), 1);
    }

    #[test]
    fn test_double_press_is_noop() {
        let mut h = harness(
            MockMicrophone::with_frames(frames(2)),
            MockSpeechModel::returning("once"),
        );

        assert!(h.controller.on_trigger_press());
        let first_id = h.controller.current_session().map(|s| s.id);
        assert!(!h.controller.on_trigger_press());
        assert!(!h.controller.on_trigger_press());

        assert_eq!(h.controller.state(), SessionState::Recording);
        assert_eq!(h.controller.current_session().map(|s| s.id), first_id);
        assert!(h.mic.wait_exhausted(WAIT));
        assert_eq!(h.mic.opens(), 1);

        assert_eq!(h.controller.on_trigger_release(), SessionOutcome::Injected);
        assert_eq!(h.injector.calls(), 1);
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut h = harness(MockMicrophone::with_frames(frames(1)), MockSpeechModel::returning("x"));
        assert_eq!(h.controller.on_trigger_release(), SessionOutcome::Ignored);
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.model.call_count(), 0);
    }

    #[test]
    fn test_silence_means_no_speech_and_no_injection() {
        let mut h = harness(
            MockMicrophone::with_frames(vec![vec![0; FRAME_BYTES]; 3]),
            MockSpeechModel::returning(""),
        );

        assert_eq!(hold_and_release(&mut h), SessionOutcome::NoSpeech);
        assert_eq!(h.model.call_count(), 1);
        assert_eq!(h.injector.calls(), 0);
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_no_audio_skips_model() {
        let mut h = harness(MockMicrophone::with_frames(Vec::new()), MockSpeechModel::returning("x"));

        assert_eq!(hold_and_release(&mut h), SessionOutcome::NoAudio);
        assert_eq!(h.model.call_count(), 0);
        assert_eq!(h.injector.calls(), 0);
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_open_failure_means_no_audio() {
        let mut h = harness(
            MockMicrophone::failing_open("no input device"),
            MockSpeechModel::returning("x"),
        );

        assert!(h.controller.on_trigger_press());
        assert_eq!(h.controller.on_trigger_release(), SessionOutcome::NoAudio);
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_read_error_transcribes_partial_audio() {
        let mut h = harness(
            MockMicrophone::new(frames(3), ScriptEnd::ReadError("overflow".to_string())),
            MockSpeechModel::returning("partial"),
        );

        assert_eq!(hold_and_release(&mut h), SessionOutcome::Injected);
        let calls = h.model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].samples, Some(3 * FRAME_BYTES / 2));
        assert_eq!(h.injector.texts(), vec!["partial"]);
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.mic.closes(), h.mic.opens());
    }

    #[test]
    fn test_transcription_failure_returns_to_idle() {
        let mut h = harness(
            MockMicrophone::with_frames(frames(2)),
            MockSpeechModel::failing("model crashed"),
        );

        assert_eq!(hold_and_release(&mut h), SessionOutcome::TranscriptionFailed);
        assert_eq!(h.injector.calls(), 0);
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(!h.model.calls()[0].path.exists());
    }

    #[test]
    fn test_join_timeout_drains_and_abandons_worker() {
        let config = ControllerConfig {
            join_timeout: Duration::from_millis(50),
            ..ControllerConfig::default()
        };
        let mut h = harness_with(
            MockMicrophone::new(frames(4), ScriptEnd::Block),
            MockSpeechModel::returning("late"),
            config,
        );

        assert_eq!(hold_and_release(&mut h), SessionOutcome::Injected);
        assert_eq!(h.controller.abandoned_workers(), 1);
        assert_eq!(h.model.calls()[0].samples, Some(4 * FRAME_BYTES / 2));
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.mic.closes(), 0);

        h.mic.unblock();
        assert!(h.mic.wait_closes(1, WAIT));
        assert_eq!(h.mic.closes(), h.mic.opens());
    }

    #[test]
    fn test_failed_direct_injection_copies_exact_text() {
        let keys = MockKeystrokes::failing();
        let clipboard = MockClipboard::new();
        let injector = Injector::new(
            InjectionMethod::Keystrokes,
            Box::new(keys),
            Box::new(clipboard.clone()),
        );

        let mic = Arc::new(MockMicrophone::with_frames(frames(2)));
        let model: Arc<MockSpeechModel> = Arc::new(MockSpeechModel::returning("Dear team,"));
        let mut controller = SessionController::new(
            ControllerConfig::default(),
            mic.clone(),
            TranscriptionAdapter::new(model, "en"),
            Box::new(injector),
        );

        assert!(controller.on_trigger_press());
        assert!(mic.wait_exhausted(WAIT));
        assert_eq!(controller.on_trigger_release(), SessionOutcome::CopiedToClipboard);
        assert_eq!(clipboard.writes(), vec!["Dear team,"]);
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_injection_failure_returns_to_idle() {
        let mic = Arc::new(MockMicrophone::with_frames(frames(1)));
        let model: Arc<MockSpeechModel> = Arc::new(MockSpeechModel::returning("text"));
        let mut controller = SessionController::new(
            ControllerConfig::default(),
            mic.clone(),
            TranscriptionAdapter::new(model, "en"),
            Box::new(RecordingInjector::failing(InjectionError::Clipboard(
                "gone".to_string(),
            ))),
        );

        assert!(controller.on_trigger_press());
        assert!(mic.wait_exhausted(WAIT));
        assert_eq!(controller.on_trigger_release(), SessionOutcome::InjectionFailed);
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_denied_prompt_stays_idle() {
        let config = ControllerConfig {
            prompt_permissions: true,
            ..ControllerConfig::default()
        };
        let h = harness_with(
            MockMicrophone::with_frames(frames(1)),
            MockSpeechModel::returning("x"),
            config,
        );
        let mut controller = h
            .controller
            .with_permission_gate(Box::new(ScriptedGate::new([false, true])));

        assert!(!controller.on_trigger_press());
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(h.mic.opens(), 0);

        assert!(controller.on_trigger_press());
        assert_eq!(controller.state(), SessionState::Recording);
    }

    #[test]
    fn test_background_mode_skips_prompt() {
        let config = ControllerConfig {
            prompt_permissions: true,
            background: true,
            ..ControllerConfig::default()
        };
        let h = harness_with(
            MockMicrophone::with_frames(frames(1)),
            MockSpeechModel::returning("x"),
            config,
        );
        let mut controller = h
            .controller
            .with_permission_gate(Box::new(ScriptedGate::new([])));

        assert!(controller.on_trigger_press());
        assert_eq!(controller.state(), SessionState::Recording);
    }

    #[test]
    fn test_sessions_do_not_share_audio() {
        let mut h = harness(
            MockMicrophone::with_frames(frames(2)),
            MockSpeechModel::returning("again"),
        );

        assert_eq!(hold_and_release(&mut h), SessionOutcome::Injected);
        assert_eq!(hold_and_release(&mut h), SessionOutcome::Injected);

        let calls = h.model.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.samples == Some(2 * FRAME_BYTES / 2)));
        assert_eq!(h.mic.opens(), 2);
    }

    #[test]
    fn test_exit_signal_stops_without_touching_session() {
        let mut h = harness(
            MockMicrophone::with_frames(frames(1)),
            MockSpeechModel::returning("x"),
        );
        assert!(h.controller.on_trigger_press());

        assert_eq!(
            h.controller.handle(InputEvent::ExitRequested),
            ListenerControl::Stop
        );
        assert_eq!(h.controller.state(), SessionState::Recording);
    }

    #[test]
    fn test_cleanup_discards_recording() {
        let mut h = harness(
            MockMicrophone::with_frames(frames(3)),
            MockSpeechModel::returning("never"),
        );
        assert!(h.controller.on_trigger_press());
        assert!(h.mic.wait_exhausted(WAIT));

        h.controller.cleanup();
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.controller.current_session().is_none());
        assert_eq!(h.model.call_count(), 0);
        assert_eq!(h.mic.closes(), 1);

        h.controller.cleanup();
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_run_processes_queue_until_exit() {
        let mut h = harness(
            MockMicrophone::with_frames(frames(2)),
            MockSpeechModel::returning("queued"),
        );
        let queue = EventQueue::new();
        let tx = queue.sender();
        tx.send(InputEvent::TriggerPressed).unwrap();
        tx.send(InputEvent::TriggerPressed).unwrap();
        tx.send(InputEvent::TriggerReleased).unwrap();
        tx.send(InputEvent::TriggerReleased).unwrap();
        tx.send(InputEvent::ExitRequested).unwrap();
        tx.send(InputEvent::TriggerPressed).unwrap();

        h.controller.run(&queue);

        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.mic.opens(), 1);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_controller_config_from_file_config() {
        let mut file = HoldscribeConfig::default();
        file.session.prompt_permissions = true;
        file.session.join_timeout_ms = 750;

        let config = ControllerConfig::from_config(&file, true);
        assert!(config.prompt_permissions);
        assert!(config.background);
        assert_eq!(config.join_timeout, Duration::from_millis(750));
        assert_eq!(config.format, AudioFormat::WHISPER);
    }
}
