//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached or opened.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A constraint (unique, not null, foreign key) rejected the statement.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The statement itself is invalid: syntax, unknown table or column.
    #[error("SQL error: {0}")]
    Sql(String),

    /// The store stayed busy or locked past the configured timeout.
    #[error("store timed out")]
    Timeout,

    /// A column value has no [`Value`](tablesync_protocol::Value) mapping.
    #[error("value conversion failed: {0}")]
    Conversion(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Returns true if repeating the same statement later may succeed.
    ///
    /// Constraint violations count as retryable: a row rejected now can be
    /// accepted once a conflicting operation has been applied.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Unavailable(_)
            | StoreError::Timeout
            | StoreError::Constraint(_)
            | StoreError::Io(_) => true,
            StoreError::Sql(_) | StoreError::Conversion(_) => false,
        }
    }

    /// Returns true if the store refused the statement, as opposed to not
    /// being reachable at all.
    pub fn is_rejection(&self) -> bool {
        matches!(self, StoreError::Constraint(_) | StoreError::Sql(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::ConstraintViolation => StoreError::Constraint(err.to_string()),
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Timeout,
                ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt => StoreError::Unavailable(err.to_string()),
                _ => StoreError::Sql(err.to_string()),
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..) => StoreError::Conversion(err.to_string()),
            _ => StoreError::Sql(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(StoreError::Timeout.is_retryable());
        assert!(StoreError::Constraint("unique".into()).is_retryable());
        assert!(!StoreError::Sql("no such table".into()).is_retryable());
        assert!(!StoreError::Conversion("blob".into()).is_retryable());
    }

    #[test]
    fn rejections_are_statement_errors() {
        assert!(StoreError::Constraint("unique".into()).is_rejection());
        assert!(StoreError::Sql("syntax".into()).is_rejection());
        assert!(!StoreError::Unavailable("down".into()).is_rejection());
        assert!(!StoreError::Timeout.is_rejection());
    }
}
