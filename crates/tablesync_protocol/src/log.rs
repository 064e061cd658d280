//! Audit log records.

use crate::operation::{OperationKind, StoreId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome recorded in an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    /// The operation or table sync completed.
    Success,
    /// The operation was discarded or the table sync raised an error.
    Failed,
}

impl LogStatus {
    /// Upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Success => "SUCCESS",
            LogStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(LogStatus::Success),
            "FAILED" => Ok(LogStatus::Failed),
            other => Err(format!("unknown log status: {other}")),
        }
    }
}

/// What an audit entry is about: one row operation, or a whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogOperation {
    /// Row insert.
    Insert,
    /// Row update.
    Update,
    /// Row delete.
    Delete,
    /// Table-level summary.
    Sync,
}

impl LogOperation {
    /// Upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            LogOperation::Insert => "INSERT",
            LogOperation::Update => "UPDATE",
            LogOperation::Delete => "DELETE",
            LogOperation::Sync => "SYNC",
        }
    }
}

impl From<OperationKind> for LogOperation {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Insert => LogOperation::Insert,
            OperationKind::Update => LogOperation::Update,
            OperationKind::Delete => LogOperation::Delete,
        }
    }
}

impl fmt::Display for LogOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LogOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(LogOperation::Insert),
            "UPDATE" => Ok(LogOperation::Update),
            "DELETE" => Ok(LogOperation::Delete),
            "SYNC" => Ok(LogOperation::Sync),
            other => Err(format!("unknown log operation: {other}")),
        }
    }
}

/// One audit record. Written by the engine, never read back by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Sequence number assigned by the sink.
    pub id: u64,
    /// Source store.
    pub source: StoreId,
    /// Target store.
    pub target: StoreId,
    /// Table name.
    pub table: String,
    /// Operation or `SYNC`.
    pub operation: LogOperation,
    /// Outcome.
    pub status: LogStatus,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
    /// Free-form detail.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_text() {
        for op in [
            LogOperation::Insert,
            LogOperation::Update,
            LogOperation::Delete,
            LogOperation::Sync,
        ] {
            assert_eq!(op.as_str().parse::<LogOperation>(), Ok(op));
        }
        assert_eq!("FAILED".parse::<LogStatus>(), Ok(LogStatus::Failed));
        assert!("MAYBE".parse::<LogStatus>().is_err());
    }

    #[test]
    fn serializes_like_the_audit_table() {
        let entry = SyncLogEntry {
            id: 1,
            source: StoreId::A,
            target: StoreId::B,
            table: "person".into(),
            operation: LogOperation::from(OperationKind::Update),
            status: LogStatus::Success,
            created_at: Utc::now(),
            message: "Row synchronized for key 1".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["source"], "dbA");
        assert_eq!(json["operation"], "UPDATE");
        assert_eq!(json["status"], "SUCCESS");
    }
}
