//! Sync orchestrator.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::config_store::ConfigStore;
use crate::error::{EngineError, EngineResult};
use crate::fetch::{fetch_rows_by_key, try_fetch_rows};
use crate::log_sink::LogSink;
use crate::queue::{PendingQueues, ReplayStats};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use chrono::{DateTime, Utc};
use tablesync_protocol::{
    diff, ConflictResolver, LogOperation, LogStatus, OperationKind, RowSet, StoreId,
    SyncLogEntry, SyncOperation, TableSyncConfig, Value,
};
use tablesync_store::SqlStore;
use tracing::{debug, error, info, warn};

/// Outcome of synchronizing one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSyncReport {
    /// Table name.
    pub table: String,
    /// Distinct primary keys seen on either side.
    pub keys_inspected: usize,
    /// Operations produced by the resolver.
    pub queued: usize,
    /// Operations applied while flushing the queues.
    pub applied: usize,
    /// Operations discarded while flushing the queues.
    pub failed: usize,
    /// False if a fetch failed, in which case the watermark is left alone.
    pub complete: bool,
}

/// Outcome of one pass over all tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPassReport {
    /// Counts from the replay that opens the pass.
    pub replayed: ReplayStats,
    /// Reports of the tables that synchronized.
    pub tables: Vec<TableSyncReport>,
    /// Names of the tables that failed.
    pub failed_tables: Vec<String>,
    /// Wall time of the pass.
    pub duration_ms: u64,
}

/// Liveness of both stores and the size of their pending queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// Store A answered its probe.
    #[serde(rename = "dbA")]
    pub db_a: bool,
    /// Store B answered its probe.
    #[serde(rename = "dbB")]
    pub db_b: bool,
    /// Operations waiting for store A.
    #[serde(rename = "pendingToDbA")]
    pub pending_to_a: usize,
    /// Operations waiting for store B.
    #[serde(rename = "pendingToDbB")]
    pub pending_to_b: usize,
}

/// Rows of one side of a table, and whether they are trustworthy.
struct Side {
    rows: RowSet,
    complete: bool,
}

/// Keeps the configured tables of two stores convergent.
///
/// The engine owns its pending queues; stores, configuration, audit log
/// and clock are shared collaborators. It is `Send + Sync` and may run
/// passes from several threads at once.
pub struct SyncEngine {
    store_a: Arc<dyn SqlStore>,
    store_b: Arc<dyn SqlStore>,
    config_store: Arc<dyn ConfigStore>,
    log: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    resolver: ConflictResolver,
    queues: PendingQueues,
    passes: AtomicU64,
}

impl SyncEngine {
    /// Creates an engine with the default configuration and wall-clock time.
    pub fn new(
        store_a: Arc<dyn SqlStore>,
        store_b: Arc<dyn SqlStore>,
        config_store: Arc<dyn ConfigStore>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let config = EngineConfig::default();
        Self {
            store_a,
            store_b,
            config_store,
            log,
            clock: Arc::new(SystemClock),
            resolver: ConflictResolver::new(config.tie_break),
            config,
            queues: PendingQueues::new(),
            passes: AtomicU64::new(0),
        }
    }

    /// Sets the engine configuration.
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.resolver = ConflictResolver::new(config.tie_break);
        self.config = config;
        self
    }

    /// Sets the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the engine configuration.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the configuration store.
    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.config_store
    }

    fn store(&self, id: StoreId) -> &dyn SqlStore {
        match id {
            StoreId::A => self.store_a.as_ref(),
            StoreId::B => self.store_b.as_ref(),
        }
    }

    /// Runs one pass: replays both queues, then synchronizes every active
    /// table. A failing table is logged and skipped.
    ///
    /// Tables are fetched incrementally from their watermark, except on
    /// every `full_scan_every`-th pass. Only a full scan sees a row deleted
    /// from A whose copy on B has not changed since the watermark.
    pub fn synchronize_all(&self) -> SyncPassReport {
        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        self.run_pass(self.config.is_full_scan(pass))
    }

    /// Runs one pass that compares whole tables regardless of watermarks.
    pub fn synchronize_all_full(&self) -> SyncPassReport {
        self.run_pass(true)
    }

    fn run_pass(&self, full: bool) -> SyncPassReport {
        if full {
            debug!("full scan pass");
        }
        let started = Instant::now();
        let mut report = SyncPassReport {
            replayed: self.replay_pending(),
            ..SyncPassReport::default()
        };

        for config in self.config_store.list() {
            if !config.active {
                debug!(table = %config.table_name, "skipping inactive table");
                continue;
            }
            self.record_table(&config, full, &mut report);
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            tables = report.tables.len(),
            failed = report.failed_tables.len(),
            duration_ms = report.duration_ms,
            "sync pass finished"
        );
        report
    }

    /// Synchronizes the named tables; an empty list means all tables.
    ///
    /// Unknown names are skipped. Inactive tables are synchronized when
    /// named explicitly.
    pub fn synchronize_tables<S: AsRef<str>>(&self, names: &[S]) -> SyncPassReport {
        if names.is_empty() {
            return self.synchronize_all();
        }

        let started = Instant::now();
        let mut report = SyncPassReport::default();
        for name in names {
            match self.config_store.find_by_name(name.as_ref()) {
                Some(config) => self.record_table(&config, false, &mut report),
                None => debug!(table = name.as_ref(), "skipping unknown table"),
            }
        }
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        report
    }

    fn record_table(&self, config: &Arc<TableSyncConfig>, full: bool, report: &mut SyncPassReport) {
        match self.synchronize_table_safely(config, full) {
            Some(table) => report.tables.push(table),
            None => report.failed_tables.push(config.table_name.clone()),
        }
    }

    /// Synchronizes one table and advances its watermark. Errors are logged
    /// as a `FAILED` table entry instead of being returned.
    fn synchronize_table_safely(
        &self,
        config: &Arc<TableSyncConfig>,
        full: bool,
    ) -> Option<TableSyncReport> {
        let started_at = self.clock.now();
        let watermark = if full { None } else { config.last_sync_time };
        let result = self.synchronize_since(config, watermark).and_then(|report| {
            if report.complete {
                self.config_store
                    .update_last_sync_time(&config.table_name, started_at)?;
            }
            Ok(report)
        });

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                error!(table = %config.table_name, error = %e, "failed to synchronize table");
                self.log.record(
                    StoreId::A,
                    StoreId::B,
                    &config.table_name,
                    LogOperation::Sync,
                    LogStatus::Failed,
                    &e.to_string(),
                );
                None
            }
        }
    }

    /// Fetches, diffs and resolves one table, then flushes both queues.
    ///
    /// The table's `last_sync_time` is the watermark for the fetch. If
    /// store A cannot be read, no deletes are produced for this pass.
    ///
    /// # Errors
    ///
    /// Returns an error if neither store can be read.
    pub fn synchronize_table(&self, config: &Arc<TableSyncConfig>) -> EngineResult<TableSyncReport> {
        self.synchronize_since(config, config.last_sync_time)
    }

    fn synchronize_since(
        &self,
        config: &Arc<TableSyncConfig>,
        watermark: Option<DateTime<Utc>>,
    ) -> EngineResult<TableSyncReport> {
        info!(table = %config.table_name, full = watermark.is_none(), "synchronizing table");

        let (mut side_a, mut side_b) = match (
            try_fetch_rows(self.store_a.as_ref(), config, watermark),
            try_fetch_rows(self.store_b.as_ref(), config, watermark),
        ) {
            (Err(e), Err(_)) => return Err(EngineError::Store(e)),
            (a, b) => (
                self.side(StoreId::A, config, a),
                self.side(StoreId::B, config, b),
            ),
        };

        if watermark.is_some() && config.tracking_column().is_some() {
            self.complete_side(StoreId::A, config, &mut side_a, &side_b.rows);
            self.complete_side(StoreId::B, config, &mut side_b, &side_a.rows);
        }

        let table_diff = diff(&side_a.rows, &side_b.rows, config);
        let mut operations = self.resolver.resolve(&table_diff, config);
        if !side_a.complete {
            let before = operations.len();
            operations.retain(|op| op.kind != OperationKind::Delete);
            if operations.len() < before {
                warn!(
                    table = %config.table_name,
                    suppressed = before - operations.len(),
                    "store A unreadable, not propagating deletes"
                );
            }
        }

        let queued = operations.len();
        for operation in operations {
            self.queues.enqueue(operation);
        }
        let flushed = self.replay_pending();

        let keys_inspected = table_diff.len();
        self.log.record(
            StoreId::A,
            StoreId::B,
            &config.table_name,
            LogOperation::Sync,
            LogStatus::Success,
            &format!("Synchronization completed with {keys_inspected} keys inspected"),
        );

        Ok(TableSyncReport {
            table: config.table_name.clone(),
            keys_inspected,
            queued,
            applied: flushed.applied,
            failed: flushed.failed,
            complete: side_a.complete && side_b.complete,
        })
    }

    fn side(
        &self,
        id: StoreId,
        config: &TableSyncConfig,
        fetched: tablesync_store::StoreResult<RowSet>,
    ) -> Side {
        match fetched {
            Ok(rows) => Side {
                rows,
                complete: true,
            },
            Err(e) => {
                warn!(store = %id, table = %config.table_name, error = %e, "failed to fetch rows");
                Side {
                    rows: RowSet::new(),
                    complete: false,
                }
            }
        }
    }

    /// After an incremental fetch, looks up on `id` the keys that only the
    /// other side returned, so unchanged rows are not mistaken for missing
    /// ones.
    fn complete_side(&self, id: StoreId, config: &TableSyncConfig, side: &mut Side, other: &RowSet) {
        if !side.complete {
            return;
        }
        let missing: Vec<Value> = other
            .keys()
            .filter(|key| side.rows.get(key).is_none())
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }

        match fetch_rows_by_key(self.store(id), config, &missing) {
            Ok(rows) => {
                let primary_key = config.primary_key_column();
                for row in rows {
                    let key = row.get_or_null(&primary_key).clone();
                    side.rows.insert(key, row);
                }
            }
            Err(e) => {
                warn!(store = %id, table = %config.table_name, error = %e, "failed to look up rows by key");
                side.complete = false;
            }
        }
    }

    /// Replays the pending queues of A, then B.
    pub fn replay_pending(&self) -> ReplayStats {
        let mut stats = ReplayStats::default();
        for target in StoreId::ALL {
            stats.merge(self.queues.replay(
                target,
                self.store(target),
                &self.config.retry,
                self.clock.as_ref(),
                self.log.as_ref(),
            ));
        }
        stats
    }

    /// Probes both stores and reports the pending queue sizes.
    pub fn health(&self) -> HealthStatus {
        let timeout = self.config.health_timeout;
        HealthStatus {
            db_a: self.store_a.is_available(timeout),
            db_b: self.store_b.is_available(timeout),
            pending_to_a: self.queues.pending_count(StoreId::A),
            pending_to_b: self.queues.pending_count(StoreId::B),
        }
    }

    /// Number of operations waiting for `target`.
    pub fn pending_count(&self, target: StoreId) -> usize {
        self.queues.pending_count(target)
    }

    /// Copies the operations waiting for `target`.
    pub fn pending_operations(&self, target: StoreId) -> Vec<SyncOperation> {
        self.queues.snapshot(target)
    }

    /// Newest audit entries, newest first; `limit` is clamped to `1..=500`.
    pub fn recent_logs(&self, limit: usize) -> Vec<SyncLogEntry> {
        self.log.recent(crate::log_sink::clamp_limit(limit))
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("store_a", &self.store_a.id())
            .field("store_b", &self.store_b.id())
            .field("config", &self.config)
            .field("queues", &self.queues)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config_store::MemoryConfigStore;
    use crate::log_sink::SyncLogService;
    use tablesync_store::SqliteStore;
    use tablesync_testkit::{count_rows, emails, fixed_time, insert_person, person_config, person_store};

    struct Fixture {
        a: Arc<SqliteStore>,
        b: Arc<SqliteStore>,
        configs: Arc<MemoryConfigStore>,
        log: Arc<SyncLogService>,
        engine: SyncEngine,
    }

    fn fixture() -> Fixture {
        let a = Arc::new(person_store());
        let b = Arc::new(person_store());
        let configs = Arc::new(MemoryConfigStore::from_configs([person_config()]).unwrap());
        let log = Arc::new(SyncLogService::in_memory(100));
        let engine = SyncEngine::new(a.clone(), b.clone(), configs.clone(), log.clone())
            .with_clock(Arc::new(ManualClock::new(fixed_time())));
        Fixture {
            a,
            b,
            configs,
            log,
            engine,
        }
    }

    #[test]
    fn new_rows_flow_from_a_to_b() {
        let f = fixture();
        insert_person(f.a.as_ref(), 1, "Alice", "alice@demo", fixed_time());

        let report = f.engine.synchronize_all();
        assert!(report.failed_tables.is_empty());
        assert_eq!(report.tables[0].keys_inspected, 1);
        assert_eq!(report.tables[0].applied, 1);
        assert_eq!(count_rows(f.b.as_ref(), "person"), 1);

        let config = f.configs.find_by_name("person").unwrap();
        assert_eq!(config.last_sync_time, Some(fixed_time()));
    }

    #[test]
    fn table_summary_is_logged() {
        let f = fixture();
        f.engine.synchronize_all();
        let entry = f.log.recent(1).remove(0);
        assert_eq!(entry.operation, LogOperation::Sync);
        assert_eq!(entry.status, LogStatus::Success);
        assert_eq!(entry.message, "Synchronization completed with 0 keys inspected");
    }

    #[test]
    fn unreadable_a_never_deletes_from_b() {
        let f = fixture();
        insert_person(f.b.as_ref(), 7, "Bea", "bea@demo", fixed_time());
        f.a.execute_batch("DROP TABLE person").unwrap();

        let report = f.engine.synchronize_all();
        assert_eq!(report.tables[0].queued, 0);
        assert!(!report.tables[0].complete);
        assert_eq!(emails(f.b.as_ref()).len(), 1);
        assert_eq!(f.configs.find_by_name("person").unwrap().last_sync_time, None);
    }

    #[test]
    fn both_sides_unreadable_fails_the_table() {
        let f = fixture();
        f.a.execute_batch("DROP TABLE person").unwrap();
        f.b.execute_batch("DROP TABLE person").unwrap();

        let report = f.engine.synchronize_all();
        assert_eq!(report.failed_tables, vec!["person".to_string()]);
        let entry = f.log.recent(1).remove(0);
        assert_eq!(entry.status, LogStatus::Failed);
        assert_eq!(entry.operation, LogOperation::Sync);
    }

    #[test]
    fn health_reports_queues() {
        let f = fixture();
        let health = f.engine.health();
        assert!(health.db_a && health.db_b);
        assert_eq!(health.pending_to_a + health.pending_to_b, 0);

        let json = serde_json::to_value(health).unwrap();
        assert_eq!(json["dbA"], true);
        assert_eq!(json["pendingToDbB"], 0);
    }
}
