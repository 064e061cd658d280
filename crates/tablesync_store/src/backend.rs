//! Store trait definition.

use crate::error::StoreResult;
use crate::statement::Statement;
use std::time::Duration;
use tablesync_protocol::Row;

/// A relational store reachable through parameterized SQL.
///
/// The engine owns no driver types; everything it does to a store goes
/// through this trait.
///
/// # Invariants
///
/// - `query` returns rows with lowercase column names
/// - `execute` returns the number of rows the statement affected
/// - `is_available` never blocks longer than `timeout` and never errors
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::SqliteStore`] - SQLite database
pub trait SqlStore: Send + Sync {
    /// Human-readable name of the store, for traces.
    fn id(&self) -> &str;

    /// Runs a statement that returns rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable, the statement is
    /// invalid, or a column value cannot be converted.
    fn query(&self, statement: &Statement) -> StoreResult<Vec<Row>>;

    /// Runs a statement that changes data and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable, the statement is
    /// invalid, or a constraint rejects it.
    fn execute(&self, statement: &Statement) -> StoreResult<u64>;

    /// Returns true if the store answers a trivial query within `timeout`.
    fn is_available(&self, timeout: Duration) -> bool;
}

impl<S: SqlStore + ?Sized> SqlStore for std::sync::Arc<S> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn query(&self, statement: &Statement) -> StoreResult<Vec<Row>> {
        (**self).query(statement)
    }

    fn execute(&self, statement: &Statement) -> StoreResult<u64> {
        (**self).execute(statement)
    }

    fn is_available(&self, timeout: Duration) -> bool {
        (**self).is_available(timeout)
    }
}
