//! Background mode: re-launch the binary detached from the terminal.

use std::ffi::OsString;

use holdscribe_core::error::Result;

/// Flags that request detaching. Stripped from the child's arguments.
const DETACH_FLAGS: [&str; 2] = ["--background", "--daemon"];

/// Marker flag the child is started with.
pub const DETACHED_FLAG: &str = "--detached";

/// Arguments for the detached child: the parent's arguments (program name
/// excluded) minus the detach flags, plus the hidden marker.
pub fn child_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out: Vec<OsString> = args
        .into_iter()
        .filter(|a| !DETACH_FLAGS.iter().any(|flag| a == flag) && a != DETACHED_FLAG)
        .collect();
    out.push(OsString::from(DETACHED_FLAG));
    out
}

/// Spawn a detached copy of this process and return its PID.
///
/// The child gets null stdio and its own process group so it survives the
/// terminal closing.
#[cfg(target_os = "macos")]
pub fn spawn_detached() -> Result<u32> {
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};

    let exe = std::env::current_exe()?;
    let args = child_args(std::env::args_os().skip(1));

    let child = Command::new(exe)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()?;

    tracing::debug!(pid = child.id(), "Spawned detached process");
    Ok(child.id())
}

#[cfg(not(target_os = "macos"))]
pub fn spawn_detached() -> Result<u32> {
    Err(holdscribe_core::error::HoldscribeError::UnsupportedPlatform(format!(
        "background mode is only supported on macOS (running on {})",
        std::env::consts::OS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(not(target_os = "macos"))]
    use holdscribe_core::error::HoldscribeError;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_child_args_strip_detach_flags() {
        let args = child_args(os(&["--background", "--key", "f9", "--daemon"]));
        assert_eq!(args, os(&["--key", "f9", "--detached"]));
    }

    #[test]
    fn test_child_args_marker_added_once() {
        let args = child_args(os(&["--detached", "--model", "tiny"]));
        assert_eq!(args, os(&["--model", "tiny", "--detached"]));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_unsupported_platform() {
        let err = spawn_detached().unwrap_err();
        assert!(matches!(err, HoldscribeError::UnsupportedPlatform(_)));
    }
}
