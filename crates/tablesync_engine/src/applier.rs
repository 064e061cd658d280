//! Operation applier.
//!
//! Turns one [`SyncOperation`] into SQL against its target store. Inserts
//! fall back to updates when the row already exists, and updates fall back
//! to inserts when the row is missing. The two fallbacks never chain into a
//! loop: an update reached from a failed insert does not insert again.

use tablesync_protocol::{OperationKind, SyncOperation};
use tablesync_store::{SqlStore, Statement, StoreError, StoreResult};
use tracing::debug;

/// What an applied operation ended up doing on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A row was inserted (directly or as an update fallback).
    Inserted,
    /// A row was updated (directly or as an insert fallback).
    Updated,
    /// The row was deleted.
    Deleted,
    /// Nothing needed to change: a delete of an absent row, or an update
    /// with no columns besides the key.
    Unchanged,
}

/// Applies one operation to `store`.
///
/// # Errors
///
/// Returns the store error of the final statement attempted.
pub fn apply(store: &dyn SqlStore, operation: &SyncOperation) -> StoreResult<ApplyOutcome> {
    match operation.kind {
        OperationKind::Insert => insert(store, operation),
        OperationKind::Update => update(store, operation, true),
        OperationKind::Delete => delete(store, operation),
    }
}

fn insert(store: &dyn SqlStore, operation: &SyncOperation) -> StoreResult<ApplyOutcome> {
    let columns: Vec<&str> = operation.row.column_names().collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let statement = Statement::new(format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        operation.table(),
        columns.join(", "),
    ))
    .bind_all(columns.iter().map(|c| operation.row.get_or_null(c).clone()));

    match store.execute(&statement) {
        Ok(_) => Ok(ApplyOutcome::Inserted),
        Err(insert_err) if insert_err.is_rejection() => {
            debug!(
                op_id = %operation.id,
                table = operation.table(),
                key = %operation.primary_key,
                error = %insert_err,
                "insert rejected, trying update"
            );
            match update(store, operation, false)? {
                // The row is not there either; the insert's error is the real one.
                ApplyOutcome::Unchanged => Err(insert_err),
                outcome => Ok(outcome),
            }
        }
        Err(e) => Err(e),
    }
}

fn update(
    store: &dyn SqlStore,
    operation: &SyncOperation,
    allow_insert_fallback: bool,
) -> StoreResult<ApplyOutcome> {
    let primary_key = operation.config.primary_key_column();
    let columns: Vec<&str> = operation
        .row
        .column_names()
        .filter(|c| *c != primary_key)
        .collect();
    if columns.is_empty() {
        return Ok(ApplyOutcome::Unchanged);
    }

    let assignments = columns
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let statement = Statement::new(format!(
        "UPDATE {} SET {assignments} WHERE {primary_key} = ?",
        operation.table(),
    ))
    .bind_all(columns.iter().map(|c| operation.row.get_or_null(c).clone()))
    .bind(operation.primary_key.clone());

    let updated = store.execute(&statement)?;
    if updated > 0 {
        return Ok(ApplyOutcome::Updated);
    }
    if allow_insert_fallback {
        debug!(
            op_id = %operation.id,
            table = operation.table(),
            key = %operation.primary_key,
            "update matched no row, inserting"
        );
        return insert(store, operation);
    }
    Ok(ApplyOutcome::Unchanged)
}

fn delete(store: &dyn SqlStore, operation: &SyncOperation) -> StoreResult<ApplyOutcome> {
    if operation.primary_key.is_null() {
        return Err(StoreError::Conversion(format!(
            "cannot delete from {} by a NULL key",
            operation.table()
        )));
    }
    let statement = Statement::new(format!(
        "DELETE FROM {} WHERE {} = ?",
        operation.table(),
        operation.config.primary_key_column(),
    ))
    .bind(operation.primary_key.clone());

    match store.execute(&statement)? {
        0 => Ok(ApplyOutcome::Unchanged),
        _ => Ok(ApplyOutcome::Deleted),
    }
}
