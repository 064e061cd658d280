//! Sync operations.

use crate::config::TableSyncConfig;
use crate::value::{Row, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Identifies one of the two participating stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StoreId {
    /// Store A.
    #[serde(rename = "dbA")]
    A,
    /// Store B.
    #[serde(rename = "dbB")]
    B,
}

impl StoreId {
    /// Both stores, in replay order.
    pub const ALL: [StoreId; 2] = [StoreId::A, StoreId::B];

    /// Returns the other store.
    pub fn other(self) -> Self {
        match self {
            StoreId::A => StoreId::B,
            StoreId::B => StoreId::A,
        }
    }

    /// Name used in logs and audit records.
    pub fn as_str(self) -> &'static str {
        match self {
            StoreId::A => "dbA",
            StoreId::B => "dbB",
        }
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StoreId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dbA" | "a" | "A" => Ok(StoreId::A),
            "dbB" | "b" | "B" => Ok(StoreId::B),
            other => Err(format!("unknown store: {other}")),
        }
    }
}

/// Type of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Row is missing on the target.
    Insert,
    /// Row differs on the target.
    Update,
    /// Row must be removed from the target.
    Delete,
}

impl OperationKind {
    /// Upper-case name used in audit records.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Insert => "INSERT",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A queued, not yet applied, row change.
///
/// Created by the resolver, then owned by the pending queue of `target`
/// until it is applied or discarded. Only the retry bookkeeping
/// (`attempts`, `next_retry_at`) changes after creation.
#[derive(Debug, Clone)]
pub struct SyncOperation {
    /// Operation ID, for correlating trace output.
    pub id: Uuid,
    /// Store the row was read from.
    pub source: StoreId,
    /// Store the change is applied to.
    pub target: StoreId,
    /// Configuration of the table at the time the operation was created.
    pub config: Arc<TableSyncConfig>,
    /// Operation type.
    pub kind: OperationKind,
    /// Row payload (lowercase column names).
    pub row: Row,
    /// Primary key value.
    pub primary_key: Value,
    /// Number of apply attempts made so far.
    pub attempts: u32,
    /// Earliest instant of the next attempt.
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl SyncOperation {
    /// Creates a fresh operation.
    pub fn new(
        source: StoreId,
        target: StoreId,
        config: Arc<TableSyncConfig>,
        kind: OperationKind,
        row: Row,
        primary_key: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            config,
            kind,
            row,
            primary_key,
            attempts: 0,
            next_retry_at: None,
        }
    }

    /// Name of the table this operation writes to.
    pub fn table(&self) -> &str {
        &self.config.table_name
    }

    /// Returns true if the operation may be attempted at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.map_or(true, |at| now >= at)
    }

    /// Counts a new attempt and returns the attempt number (1-based).
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Schedules the next attempt.
    pub fn arm_retry(&mut self, at: DateTime<Utc>) {
        self.next_retry_at = Some(at);
    }

    /// Returns true if both operations write the same row of the same
    /// table, from the same source to the same target.
    pub fn supersedes(&self, other: &SyncOperation) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.primary_key == other.primary_key
            && self.config.matches_name(&other.config.table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn op(kind: OperationKind, key: i64) -> SyncOperation {
        SyncOperation::new(
            StoreId::A,
            StoreId::B,
            Arc::new(TableSyncConfig::new("person", "id")),
            kind,
            Row::new().with("id", key),
            Value::Integer(key),
        )
    }

    #[test]
    fn store_names() {
        assert_eq!(StoreId::A.to_string(), "dbA");
        assert_eq!(StoreId::B.other(), StoreId::A);
        assert_eq!("dbB".parse::<StoreId>(), Ok(StoreId::B));
        assert!("dbC".parse::<StoreId>().is_err());
        assert_eq!(OperationKind::Delete.to_string(), "DELETE");
    }

    #[test]
    fn eligibility_follows_retry_time() {
        let now = Utc::now();
        let mut operation = op(OperationKind::Insert, 1);
        assert!(operation.is_eligible(now));

        operation.arm_retry(now + Duration::milliseconds(500));
        assert!(!operation.is_eligible(now));
        assert!(operation.is_eligible(now + Duration::milliseconds(500)));
    }

    #[test]
    fn attempts_are_counted() {
        let mut operation = op(OperationKind::Update, 1);
        assert_eq!(operation.record_attempt(), 1);
        assert_eq!(operation.record_attempt(), 2);
        assert_eq!(operation.attempts, 2);
    }

    #[test]
    fn supersedes_same_row_only() {
        let a = op(OperationKind::Insert, 1);
        let b = op(OperationKind::Update, 1);
        let c = op(OperationKind::Insert, 2);
        assert!(b.supersedes(&a));
        assert!(!c.supersedes(&a));

        let mut reverse = op(OperationKind::Update, 1);
        reverse.source = StoreId::B;
        reverse.target = StoreId::A;
        assert!(!reverse.supersedes(&a));
    }
}
