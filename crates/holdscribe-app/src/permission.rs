//! Terminal prompts for input-monitoring permission.

use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;

use holdscribe_core::error::{HoldscribeError, Result};
use holdscribe_core::types::TriggerKey;
use holdscribe_dictation::{
    is_input_monitoring_trusted, request_input_monitoring_trust, PermissionGate,
};

const HELP: &str = "HoldScribe needs Accessibility / Input Monitoring access to see the trigger key. \
                    Grant it in System Settings > Privacy & Security > Accessibility and restart.";

/// Ask a yes/no question on the terminal. A prompt that cannot be shown
/// counts as "no".
fn confirm(prompt: &str, default: bool) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Permission prompt failed");
            false
        })
}

/// Per-session gate that shows the permission status and asks on the
/// terminal before each recording.
#[derive(Debug)]
pub struct InteractiveGate {
    trigger: TriggerKey,
}

impl InteractiveGate {
    pub fn new(trigger: TriggerKey) -> Self {
        Self { trigger }
    }

    fn status_lines(&self, trusted: bool) -> Vec<String> {
        vec![
            format!(
                "Accessibility: {}",
                if trusted { "granted" } else { "not granted" }
            ),
            "Microphone: requested by the system on first use".to_string(),
            format!(
                "HoldScribe will watch the {} key, record while it is held, \
                 transcribe the audio and type the text at the cursor",
                self.trigger
            ),
        ]
    }
}

impl PermissionGate for InteractiveGate {
    fn allow_session(&mut self) -> bool {
        let trusted = is_input_monitoring_trusted();
        for line in self.status_lines(trusted) {
            tracing::info!("{}", line);
        }
        if !trusted {
            tracing::warn!("Some features may not work without Accessibility access");
        }
        confirm("Allow these actions?", false)
    }
}

/// Verify the process may observe global key events before starting.
pub fn startup_check(interactive: bool) -> Result<()> {
    startup_check_with(
        interactive,
        is_input_monitoring_trusted,
        request_input_monitoring_trust,
        confirm,
    )
}

/// Startup permission flow with its OS and terminal hooks passed in.
///
/// An untrusted process asks before requesting access (interactive only),
/// then triggers the system dialog. If access is still missing, an
/// interactive user may continue anyway; a background run fails.
fn startup_check_with(
    interactive: bool,
    trusted: impl Fn() -> bool,
    request: impl Fn() -> bool,
    mut ask: impl FnMut(&str, bool) -> bool,
) -> Result<()> {
    if trusted() {
        tracing::debug!("Accessibility access already granted");
        return Ok(());
    }

    if interactive {
        tracing::info!("HoldScribe needs Accessibility access to detect the trigger key");
        if !ask("Grant Accessibility access now?", false) {
            return Err(HoldscribeError::Permission(
                "access request declined by user".to_string(),
            ));
        }
    }

    if request() {
        tracing::info!("Accessibility access granted");
        return Ok(());
    }

    tracing::warn!("{}", HELP);
    if interactive && ask("Continue without Accessibility access?", false) {
        return Ok(());
    }
    Err(HoldscribeError::Permission(HELP.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn no_prompt(prompt: &str, _default: bool) -> bool {
        panic!("unexpected prompt: {}", prompt)
    }

    #[test]
    fn test_trusted_process_skips_everything() {
        let requested = Cell::new(false);
        let result = startup_check_with(
            true,
            || true,
            || {
                requested.set(true);
                true
            },
            no_prompt,
        );
        assert!(result.is_ok());
        assert!(!requested.get());
    }

    #[test]
    fn test_background_requests_without_asking() {
        assert!(startup_check_with(false, || false, || true, no_prompt).is_ok());

        let result = startup_check_with(false, || false, || false, no_prompt);
        assert!(matches!(result, Err(HoldscribeError::Permission(_))));
    }

    #[test]
    fn test_interactive_decline_skips_system_dialog() {
        let requested = Cell::new(false);
        let mut prompts = Vec::new();
        let result = startup_check_with(
            true,
            || false,
            || {
                requested.set(true);
                true
            },
            |prompt, default| {
                prompts.push(prompt.to_string());
                assert!(!default);
                false
            },
        );
        assert!(matches!(result, Err(HoldscribeError::Permission(_))));
        assert!(!requested.get());
        assert_eq!(prompts, vec!["Grant Accessibility access now?"]);
    }

    #[test]
    fn test_interactive_request_granted() {
        let mut asked = 0;
        let result = startup_check_with(true, || false, || true, |_, _| {
            asked += 1;
            true
        });
        assert!(result.is_ok());
        assert_eq!(asked, 1);
    }

    #[test]
    fn test_interactive_may_continue_without_access() {
        let mut answers = vec![true, true].into_iter();
        let result = startup_check_with(true, || false, || false, |_, _| {
            answers.next().unwrap_or(false)
        });
        assert!(result.is_ok());

        let mut answers = vec![true, false].into_iter();
        let result = startup_check_with(true, || false, || false, |_, _| {
            answers.next().unwrap_or(false)
        });
        assert!(matches!(result, Err(HoldscribeError::Permission(_))));
    }

    #[test]
    fn test_gate_status_lines() {
        let gate = InteractiveGate::new(TriggerKey::F9);
        let lines = gate.status_lines(false);
        assert_eq!(lines[0], "Accessibility: not granted");
        assert!(lines[2].contains("f9"));
        assert_eq!(gate.status_lines(true)[0], "Accessibility: granted");
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_startup_check_passes_when_trusted() {
        assert!(startup_check(false).is_ok());
        assert!(startup_check(true).is_ok());
    }
}
