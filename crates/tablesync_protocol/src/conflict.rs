//! Conflict resolution.
//!
//! Turns a [`TableDiff`] into the row operations that make both stores
//! converge. Store A is the authority for row existence: a row only in A
//! is inserted into B, a row missing from A is deleted from B. Rows that
//! exist on both sides but differ are resolved last-write-wins on the
//! change-tracking column.

use crate::config::TableSyncConfig;
use crate::diff::{KeyDiff, TableDiff};
use crate::operation::{OperationKind, StoreId, SyncOperation};
use crate::value::{Row, Value};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What to do when two differing rows cannot be ordered by timestamp.
///
/// This covers equal timestamps, a missing tracking column, and values
/// that are not store-native timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Queue an update in both directions, each carrying its own side's
    /// row, and let a later pass converge.
    ///
    /// If the stores never produce distinguishable timestamps this can
    /// oscillate forever.
    #[default]
    Bidirectional,
    /// The given store's row wins.
    Prefer(StoreId),
}

/// Returns the change-tracking timestamp of a row, if it has one.
///
/// Only store-native timestamps count; anything else is unavailable.
pub fn tracking_timestamp(row: &Row, config: &TableSyncConfig) -> Option<DateTime<Utc>> {
    let column = config.tracking_column()?;
    row.get(&column).and_then(Value::as_timestamp)
}

/// Decides the direction of propagation for every classified key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    tie_break: TieBreak,
}

impl ConflictResolver {
    /// Creates a resolver with the given tie-break policy.
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// Returns the tie-break policy.
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Produces the operations for one table, in key order.
    pub fn resolve(&self, diff: &TableDiff<'_>, config: &Arc<TableSyncConfig>) -> Vec<SyncOperation> {
        let mut operations = Vec::new();
        for entry in diff.entries() {
            let key = entry.key;
            match entry.diff {
                KeyDiff::Equal => {}
                KeyDiff::OnlyInA(row) => operations.push(SyncOperation::new(
                    StoreId::A,
                    StoreId::B,
                    Arc::clone(config),
                    OperationKind::Insert,
                    row.clone(),
                    key.clone(),
                )),
                KeyDiff::OnlyInB(row) => operations.push(SyncOperation::new(
                    StoreId::A,
                    StoreId::B,
                    Arc::clone(config),
                    OperationKind::Delete,
                    row.clone(),
                    key.clone(),
                )),
                KeyDiff::Differing { a, b } => {
                    for source in self.update_sources(a, b, config) {
                        let row = match source {
                            StoreId::A => a,
                            StoreId::B => b,
                        };
                        operations.push(SyncOperation::new(
                            source,
                            source.other(),
                            Arc::clone(config),
                            OperationKind::Update,
                            row.clone(),
                            key.clone(),
                        ));
                    }
                }
            }
        }
        operations
    }

    /// Stores whose row must be pushed to the other side.
    fn update_sources(&self, a: &Row, b: &Row, config: &TableSyncConfig) -> Vec<StoreId> {
        let ts_a = tracking_timestamp(a, config);
        let ts_b = tracking_timestamp(b, config);
        match (ts_a, ts_b) {
            (Some(ts_a), Some(ts_b)) if ts_a > ts_b => vec![StoreId::A],
            (Some(ts_a), Some(ts_b)) if ts_b > ts_a => vec![StoreId::B],
            _ => match self.tie_break {
                TieBreak::Bidirectional => vec![StoreId::A, StoreId::B],
                TieBreak::Prefer(store) => vec![store],
            },
        }
    }
}
