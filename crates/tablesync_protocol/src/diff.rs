//! Row set comparison.
//!
//! Classifies every primary key found on either side into one of
//! [`KeyDiff`]'s variants. A key absent from one side is never `Equal`.

use crate::config::TableSyncConfig;
use crate::value::{Row, RowSet, Value};
use std::collections::BTreeSet;

/// Classification of one primary key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyDiff<'a> {
    /// Present only in store A.
    OnlyInA(&'a Row),
    /// Present only in store B.
    OnlyInB(&'a Row),
    /// Present in both with equal comparison columns.
    Equal,
    /// Present in both with at least one differing comparison column.
    Differing {
        /// Row from store A.
        a: &'a Row,
        /// Row from store B.
        b: &'a Row,
    },
}

/// One classified key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffEntry<'a> {
    /// Primary key value.
    pub key: &'a Value,
    /// Classification.
    pub diff: KeyDiff<'a>,
}

/// Result of comparing the two row sets of a table.
#[derive(Debug, Clone, Default)]
pub struct TableDiff<'a> {
    entries: Vec<DiffEntry<'a>>,
}

impl<'a> TableDiff<'a> {
    /// All classified keys, in key order.
    pub fn entries(&self) -> &[DiffEntry<'a>] {
        &self.entries
    }

    /// Number of keys inspected (the union of both sides).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if neither side had any rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the classification of one key.
    pub fn get(&self, key: &Value) -> Option<&KeyDiff<'a>> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.diff)
    }

    /// Number of keys that need no change.
    pub fn equal_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.diff, KeyDiff::Equal))
            .count()
    }
}

/// Columns whose values decide whether two rows differ.
///
/// The configured include list (or, when it is empty or `*`, the union of
/// both rows' columns) minus the primary key and the tracking column.
pub fn comparison_columns(a: &Row, b: &Row, config: &TableSyncConfig) -> BTreeSet<String> {
    let mut columns: BTreeSet<String> = if config.includes_all_columns() {
        a.column_names()
            .chain(b.column_names())
            .map(str::to_string)
            .collect()
    } else {
        config
            .include_columns
            .iter()
            .map(|c| c.trim().to_lowercase())
            .collect()
    };
    columns.remove(&config.primary_key_column());
    if let Some(tracking) = config.tracking_column() {
        columns.remove(&tracking);
    }
    columns
}

/// Returns true if any comparison column differs (null-safe).
pub fn rows_differ(a: &Row, b: &Row, config: &TableSyncConfig) -> bool {
    comparison_columns(a, b, config)
        .iter()
        .any(|column| a.get_or_null(column) != b.get_or_null(column))
}

/// Compares the A-side and B-side row sets of one table.
pub fn diff<'a>(a: &'a RowSet, b: &'a RowSet, config: &TableSyncConfig) -> TableDiff<'a> {
    let keys: BTreeSet<&Value> = a.keys().chain(b.keys()).collect();

    let entries = keys
        .into_iter()
        .filter_map(|key| {
            let diff = match (a.get(key), b.get(key)) {
                (Some(row_a), None) => KeyDiff::OnlyInA(row_a),
                (None, Some(row_b)) => KeyDiff::OnlyInB(row_b),
                (Some(row_a), Some(row_b)) => {
                    if rows_differ(row_a, row_b, config) {
                        KeyDiff::Differing { a: row_a, b: row_b }
                    } else {
                        KeyDiff::Equal
                    }
                }
                (None, None) => return None,
            };
            Some(DiffEntry { key, diff })
        })
        .collect();

    TableDiff { entries }
}
