//! Audit log sink.
//!
//! Every applied or discarded operation and every table pass produces one
//! [`SyncLogEntry`]. Recording never fails: persistence errors are traced
//! and the entry is still kept in memory.

use crate::clock::{Clock, SystemClock};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tablesync_protocol::{
    parse_timestamp, LogOperation, LogStatus, Row, StoreId, SyncLogEntry, Value,
};
use tablesync_store::{SqlStore, SqliteStore, Statement, StoreResult};
use tracing::{debug, warn};

/// Number of entries kept in memory by default.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Largest `limit` accepted by [`LogSink::recent`].
pub const MAX_LOG_LIMIT: usize = 500;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS sync_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_db TEXT NOT NULL,
    target_db TEXT NOT NULL,
    table_name TEXT NOT NULL,
    operation_type TEXT NOT NULL,
    status TEXT NOT NULL,
    create_time TIMESTAMP NOT NULL,
    message TEXT
)";

/// Receives audit entries from the engine.
pub trait LogSink: Send + Sync {
    /// Records one entry. Must not fail.
    fn record(
        &self,
        source: StoreId,
        target: StoreId,
        table: &str,
        operation: LogOperation,
        status: LogStatus,
        message: &str,
    );

    /// Returns up to `limit` of the newest entries, newest first.
    ///
    /// `limit` is clamped to `1..=MAX_LOG_LIMIT`.
    fn recent(&self, limit: usize) -> Vec<SyncLogEntry>;
}

/// Clamps a requested log limit into the accepted range.
pub(crate) fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LOG_LIMIT)
}

/// Bounded in-memory audit log with optional persistence to a
/// `sync_log` table.
pub struct SyncLogService {
    ring: Mutex<VecDeque<SyncLogEntry>>,
    capacity: usize,
    next_id: AtomicU64,
    store: Option<Arc<dyn SqlStore>>,
    clock: Arc<dyn Clock>,
}

impl SyncLogService {
    /// Creates a sink that only keeps the newest `capacity` entries in memory.
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Creates a sink that also writes every entry to `sync_log` on `store`.
    pub fn persistent(store: Arc<dyn SqlStore>, capacity: usize) -> Self {
        Self {
            store: Some(store),
            ..Self::in_memory(capacity)
        }
    }

    /// Uses the given clock for entry timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns true if entries are written to a store.
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Creates the `sync_log` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the store error if the table cannot be created.
    pub fn ensure_table(&self) -> StoreResult<()> {
        match &self.store {
            Some(store) => store.execute(&Statement::new(CREATE_TABLE_SQL)).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Creates the `sync_log` table on a SQLite store before the store is
    /// handed to a sink.
    ///
    /// # Errors
    ///
    /// Returns the store error if the table cannot be created.
    pub fn ensure_table_on(store: &SqliteStore) -> StoreResult<()> {
        store.execute_batch(CREATE_TABLE_SQL)
    }

    fn persist(&self, store: &dyn SqlStore, entry: &SyncLogEntry) {
        let statement = Statement::new(
            "INSERT INTO sync_log (source_db, target_db, table_name, operation_type, status, create_time, message) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.source.as_str())
        .bind(entry.target.as_str())
        .bind(entry.table.as_str())
        .bind(entry.operation.as_str())
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .bind(entry.message.as_str());

        if let Err(e) = store.execute(&statement) {
            warn!(error = %e, table = %entry.table, "failed to persist sync log entry");
        }
    }

    fn recent_from_store(store: &dyn SqlStore, limit: usize) -> StoreResult<Vec<SyncLogEntry>> {
        let statement = Statement::new(
            "SELECT id, source_db, target_db, table_name, operation_type, status, create_time, message \
             FROM sync_log ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX));

        Ok(store
            .query(&statement)?
            .iter()
            .filter_map(|row| {
                let entry = entry_from_row(row);
                if entry.is_none() {
                    debug!(?row, "skipping unreadable sync log row");
                }
                entry
            })
            .collect())
    }

    fn recent_from_ring(&self, limit: usize) -> Vec<SyncLogEntry> {
        self.ring.lock().iter().take(limit).cloned().collect()
    }
}

impl Default for SyncLogService {
    fn default() -> Self {
        Self::in_memory(DEFAULT_LOG_CAPACITY)
    }
}

impl std::fmt::Debug for SyncLogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLogService")
            .field("capacity", &self.capacity)
            .field("buffered", &self.ring.lock().len())
            .field("store", &self.store.as_ref().map(|s| s.id().to_string()))
            .finish()
    }
}

impl LogSink for SyncLogService {
    fn record(
        &self,
        source: StoreId,
        target: StoreId,
        table: &str,
        operation: LogOperation,
        status: LogStatus,
        message: &str,
    ) {
        let entry = SyncLogEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            source,
            target,
            table: table.to_string(),
            operation,
            status,
            created_at: self.clock.now(),
            message: message.to_string(),
        };
        debug!(
            table,
            %source,
            %target,
            %operation,
            %status,
            detail = message,
            "sync log"
        );

        if let Some(store) = &self.store {
            self.persist(store.as_ref(), &entry);
        }

        let mut ring = self.ring.lock();
        ring.push_front(entry);
        ring.truncate(self.capacity);
    }

    fn recent(&self, limit: usize) -> Vec<SyncLogEntry> {
        let limit = clamp_limit(limit);
        match &self.store {
            Some(store) => Self::recent_from_store(store.as_ref(), limit).unwrap_or_else(|e| {
                warn!(error = %e, "sync_log unavailable, falling back to in-memory entries");
                self.recent_from_ring(limit)
            }),
            None => self.recent_from_ring(limit),
        }
    }
}

fn entry_from_row(row: &Row) -> Option<SyncLogEntry> {
    let text = |column: &str| row.get(column).and_then(Value::as_text);
    let created_at = match row.get("create_time")? {
        Value::Timestamp(ts) => *ts,
        Value::Text(s) => parse_timestamp(s)?,
        _ => return None,
    };
    Some(SyncLogEntry {
        id: u64::try_from(row.get("id")?.as_integer()?).ok()?,
        source: text("source_db")?.parse().ok()?,
        target: text("target_db")?.parse().ok()?,
        table: text("table_name")?.to_string(),
        operation: text("operation_type")?.parse().ok()?,
        status: text("status")?.parse().ok()?,
        created_at,
        message: text("message").unwrap_or_default().to_string(),
    })
}
