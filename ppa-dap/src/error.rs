//! Error types for report submission.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while resolving keys or submitting a DAP report.
#[derive(Debug, Error)]
pub enum DapError {
    /// The deployment is missing something submission cannot proceed without.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Fetching the gateway key configuration failed.
    #[error("Key fetch failed: {0}")]
    KeyFetch(String),

    /// The gateway key configuration could not be parsed.
    #[error("Invalid key config: {0}")]
    KeyConfig(String),

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    /// The transport rejected or failed to deliver a submission.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl DapError {
    /// Whether this error reflects a deployment problem rather than a
    /// transient failure.
    ///
    /// Configuration errors are the only ones surfaced to callers; everything
    /// else is logged and the report is dropped.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias for submission operations.
pub type Result<T> = std::result::Result<T, DapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DapError::KeyFetch("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_timeout_display() {
        let err = DapError::Timeout {
            operation: "key fetch",
            elapsed: Duration::from_secs(15),
        };
        assert_eq!(err.to_string(), "key fetch timed out after 15s");
    }

    #[test]
    fn test_only_configuration_is_configuration() {
        assert!(DapError::Configuration("no relay".into()).is_configuration());
        assert!(!DapError::Transport("503".into()).is_configuration());
        assert!(!DapError::KeyConfig("short".into()).is_configuration());
    }
}
