//! Error types for ppa-core

use thiserror::Error;

/// Error type for attribution operations
#[derive(Debug, Error)]
pub enum AttributionError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Store was unusable (lock poisoned, corrupt value, ...)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Serialization or deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Unrecognized impression event type
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Report submission failed
    #[error("Submission error: {0}")]
    Dap(#[from] ppa_dap::DapError),
}

impl AttributionError {
    /// Whether this error is a deployment invariant violation that callers
    /// must see, as opposed to a transient failure that is logged and dropped.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Dap(e) if e.is_configuration())
    }
}

/// Result type alias for attribution operations
pub type Result<T> = std::result::Result<T, AttributionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ppa_dap::DapError;

    #[test]
    fn test_error_display() {
        let err = AttributionError::Storage("lock poisoned".into());
        assert!(err.to_string().contains("lock poisoned"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AttributionError = io_err.into();
        assert!(matches!(err, AttributionError::Io(_)));
    }

    #[test]
    fn test_configuration_classification() {
        let config: AttributionError = DapError::Configuration("no relay".into()).into();
        assert!(config.is_configuration());

        let transport: AttributionError = DapError::Transport("503".into()).into();
        assert!(!transport.is_configuration());

        assert!(!AttributionError::Storage("x".into()).is_configuration());
    }
}
