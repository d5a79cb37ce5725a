//! Input-monitoring permission checks.

/// Decides whether a session may start. Consulted before every recording
/// when per-session prompting is enabled.
pub trait PermissionGate {
    fn allow_session(&mut self) -> bool;
}

/// Gate that grants every session.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn allow_session(&mut self) -> bool {
        true
    }
}

/// Gate that answers from a fixed script, then denies.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGate {
    answers: std::collections::VecDeque<bool>,
    asked: usize,
}

impl ScriptedGate {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: 0,
        }
    }

    /// Times the gate has been consulted.
    pub fn asked(&self) -> usize {
        self.asked
    }
}

impl PermissionGate for ScriptedGate {
    fn allow_session(&mut self) -> bool {
        self.asked += 1;
        self.answers.pop_front().unwrap_or(false)
    }
}

#[cfg(target_os = "macos")]
mod ax {
    use core_foundation::base::TCFType;
    use core_foundation::boolean::CFBoolean;
    use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
    use core_foundation::string::CFString;

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn AXIsProcessTrusted() -> u8;
        fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> u8;
    }

    pub fn is_trusted() -> bool {
        // SAFETY: AXIsProcessTrusted takes no arguments and only reads the
        // process's trust state.
        unsafe { AXIsProcessTrusted() != 0 }
    }

    pub fn request_trust() -> bool {
        let options = CFDictionary::from_CFType_pairs(&[(
            CFString::from_static_string("AXTrustedCheckOptionPrompt"),
            CFBoolean::true_value(),
        )]);
        // SAFETY: `options` is a valid CFDictionary that outlives the call;
        // the function does not take ownership of it.
        unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) != 0 }
    }
}

/// Whether the OS lets this process observe global key events.
///
/// On macOS this is the Accessibility trust flag. Other platforms have no
/// equivalent switch and always report `true`.
#[cfg(target_os = "macos")]
pub fn is_input_monitoring_trusted() -> bool {
    ax::is_trusted()
}

#[cfg(not(target_os = "macos"))]
pub fn is_input_monitoring_trusted() -> bool {
    true
}

/// Ask the OS to show its Accessibility permission dialog and return the
/// trust flag at that moment. The user usually answers the dialog later, so
/// `false` is common even when access is about to be granted.
#[cfg(target_os = "macos")]
pub fn request_input_monitoring_trust() -> bool {
    tracing::info!("Requesting Accessibility access, a system dialog will appear");
    ax::request_trust()
}

#[cfg(not(target_os = "macos"))]
pub fn request_input_monitoring_trust() -> bool {
    true
}
