//! Error types for the sync engine.

use tablesync_protocol::ConfigError;
use tablesync_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while synchronizing.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A store rejected or could not run a statement.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A table configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Engine or scheduler settings are invalid.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// A background sync task panicked or was cancelled.
    #[error("sync task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Returns true if running the same pass again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Store(e) => e.is_retryable(),
            EngineError::Task(_) => true,
            EngineError::Config(_) | EngineError::Settings(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_their_class() {
        let err = EngineError::from(StoreError::Timeout);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("timed out"));

        let err = EngineError::from(StoreError::Sql("no such table: t".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn config_errors_are_permanent() {
        let err = EngineError::from(ConfigError::Duplicate("person".into()));
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "configuration error: table already configured: person"
        );
    }
}
