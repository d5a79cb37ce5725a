use thiserror::Error;

/// Top-level error type for HoldScribe.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define their
/// own error types and implement `From<SubsystemError> for HoldscribeError` so
/// that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HoldscribeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Injection error: {0}")]
    Injection(String),

    #[error("Input hook error: {0}")]
    Input(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for HoldscribeError {
    fn from(err: toml::de::Error) -> Self {
        HoldscribeError::Config(err.to_string())
    }
}

/// A specialized `Result` type for HoldScribe operations.
pub type Result<T> = std::result::Result<T, HoldscribeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HoldscribeError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(HoldscribeError, &str)> = vec![
            (
                HoldscribeError::Capture("device lost".to_string()),
                "Capture error: device lost",
            ),
            (
                HoldscribeError::Transcription("model error".to_string()),
                "Transcription error: model error",
            ),
            (
                HoldscribeError::Injection("xdotool missing".to_string()),
                "Injection error: xdotool missing",
            ),
            (
                HoldscribeError::Input("hook refused".to_string()),
                "Input hook error: hook refused",
            ),
            (
                HoldscribeError::Permission("accessibility".to_string()),
                "Permission denied: accessibility",
            ),
            (
                HoldscribeError::UnsupportedPlatform("linux".to_string()),
                "Unsupported platform: linux",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: HoldscribeError = io_err.into();
        assert!(matches!(err, HoldscribeError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let converted: HoldscribeError = err.unwrap_err().into();
        assert!(matches!(converted, HoldscribeError::Config(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
