//! Settings file.
//!
//! ```toml
//! [stores]
//! busy_timeout_ms = 5000
//!
//! [stores.a]
//! path = "data/a.db"
//!
//! [stores.b]
//! path = "data/b.db"
//!
//! [engine]
//! max_attempts = 3
//! base_delay_ms = 500
//! tie_break = "bidirectional"   # or "dbA" / "dbB"
//! full_scan_every = 10          # 0 = incremental passes only
//!
//! [scheduler]
//! enabled = true
//! interval_ms = 10000
//!
//! [log]
//! persist = true                # write sync_log to store A
//! capacity = 500
//!
//! [[tables]]
//! table_name = "person"
//! primary_key = "id"
//! include_columns = ["name", "email", "last_update"]
//! last_update_column = "last_update"
//! ```
//!
//! Relative store paths are resolved against the settings file's directory.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tablesync_engine::{
    EngineConfig, MemoryConfigStore, RetryConfig, SyncEngine, SyncLogService,
    DEFAULT_LOG_CAPACITY, DEFAULT_SYNC_INTERVAL,
};
use tablesync_protocol::{StoreId, TableSyncConfig, TieBreak};
use tablesync_store::{SqliteStore, StoreSettings, DEFAULT_BUSY_TIMEOUT};
use tracing::{debug, info};

/// Parsed settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Store locations.
    pub stores: StoresSettings,
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineSettings,
    /// Periodic pass settings.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Audit log settings.
    #[serde(default)]
    pub log: LogSettings,
    /// Tables to keep in sync.
    #[serde(default)]
    pub tables: Vec<TableSyncConfig>,
}

/// `[stores]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoresSettings {
    /// Store A, the authority for row existence.
    pub a: StoreLocation,
    /// Store B.
    pub b: StoreLocation,
    /// SQLite busy timeout for both stores.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Location of one store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreLocation {
    /// SQLite database file.
    pub path: PathBuf,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Attempts per pending operation.
    pub max_attempts: u32,
    /// Backoff base delay.
    pub base_delay_ms: u64,
    /// Backoff ceiling.
    pub max_delay_ms: u64,
    /// `bidirectional`, `dbA` or `dbB`.
    pub tie_break: String,
    /// Bound on each store's liveness probe.
    pub health_timeout_ms: u64,
    /// Every n-th pass ignores the watermarks.
    pub full_scan_every: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            max_attempts: defaults.retry.max_attempts,
            base_delay_ms: duration_ms(defaults.retry.base_delay),
            max_delay_ms: duration_ms(defaults.retry.max_delay),
            tie_break: "bidirectional".into(),
            health_timeout_ms: duration_ms(defaults.health_timeout),
            full_scan_every: defaults.full_scan_every,
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Whether `run` loops or performs a single pass.
    pub enabled: bool,
    /// Delay between passes.
    pub interval_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: duration_ms(DEFAULT_SYNC_INTERVAL),
        }
    }
}

impl SchedulerSettings {
    /// Delay between passes.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Write audit entries to a `sync_log` table on store A.
    pub persist: bool,
    /// Entries kept in memory.
    pub capacity: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            persist: false,
            capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    duration_ms(DEFAULT_BUSY_TIMEOUT)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_tie_break(text: &str) -> Result<TieBreak> {
    match text.trim() {
        "" | "bidirectional" => Ok(TieBreak::Bidirectional),
        other => other
            .parse::<StoreId>()
            .map(TieBreak::Prefer)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("invalid tie_break {other:?}")),
    }
}

impl Settings {
    /// Reads and parses a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&text, base)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Parses settings, resolving relative store paths against `base`.
    pub fn from_toml(text: &str, base: &Path) -> Result<Self> {
        let mut settings: Settings = toml::from_str(text)?;
        for location in [&mut settings.stores.a, &mut settings.stores.b] {
            if location.path.is_relative() {
                location.path = base.join(&location.path);
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.stores.a.path == self.stores.b.path {
            bail!("stores a and b point at the same file");
        }
        if self.scheduler.enabled && self.scheduler.interval_ms == 0 {
            bail!("scheduler.interval_ms must be greater than zero");
        }
        if self.engine.max_attempts == 0 {
            bail!("engine.max_attempts must be at least 1");
        }
        parse_tie_break(&self.engine.tie_break)?;
        Ok(())
    }

    /// Engine configuration described by the `[engine]` section.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let retry = RetryConfig::new(self.engine.max_attempts)
            .with_base_delay(Duration::from_millis(self.engine.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.engine.max_delay_ms));
        Ok(EngineConfig::new()
            .with_retry(retry)
            .with_tie_break(parse_tie_break(&self.engine.tie_break)?)
            .with_health_timeout(Duration::from_millis(self.engine.health_timeout_ms))
            .with_full_scan_every(self.engine.full_scan_every))
    }

    fn store_settings(&self) -> StoreSettings {
        StoreSettings::default().with_busy_timeout(Duration::from_millis(self.stores.busy_timeout_ms))
    }

    /// Opens both stores and assembles an engine over them.
    pub fn build_engine(&self) -> Result<Arc<SyncEngine>> {
        let store_settings = self.store_settings();
        let store_a = Arc::new(
            SqliteStore::open_with_settings(&self.stores.a.path, &store_settings)
                .context("failed to open store A")?,
        );
        let store_b = Arc::new(
            SqliteStore::open_with_settings(&self.stores.b.path, &store_settings)
                .context("failed to open store B")?,
        );

        let configs = Arc::new(
            MemoryConfigStore::from_configs(self.tables.iter().cloned())
                .context("invalid table configuration")?,
        );

        let log = if self.log.persist {
            SyncLogService::ensure_table_on(&store_a).context("failed to create sync_log table")?;
            SyncLogService::persistent(store_a.clone(), self.log.capacity)
        } else {
            SyncLogService::in_memory(self.log.capacity)
        };
        debug!(persistent = log.is_persistent(), "audit log ready");

        let engine = SyncEngine::new(store_a, store_b, configs, Arc::new(log))
            .with_engine_config(self.engine_config()?);
        info!(tables = self.tables.len(), "engine ready");
        Ok(Arc::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_engine::ConfigStore;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
        [stores.a]
        path = "a.db"

        [stores.b]
        path = "/var/lib/tablesync/b.db"
    "#;

    #[test]
    fn defaults_fill_missing_sections() {
        let settings = Settings::from_toml(MINIMAL, Path::new("/etc/tablesync")).unwrap();
        assert_eq!(settings.stores.a.path, Path::new("/etc/tablesync/a.db"));
        assert_eq!(settings.stores.b.path, Path::new("/var/lib/tablesync/b.db"));
        assert_eq!(settings.stores.busy_timeout_ms, 5000);
        assert!(settings.scheduler.enabled);
        assert_eq!(settings.scheduler.interval(), DEFAULT_SYNC_INTERVAL);
        assert!(!settings.log.persist);
        assert!(settings.tables.is_empty());

        let config = settings.engine_config().unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.tie_break, TieBreak::Bidirectional);
        assert_eq!(config.full_scan_every, 10);
    }

    #[test]
    fn tables_and_engine_section_parse() {
        let text = format!(
            "{MINIMAL}
            [engine]
            max_attempts = 5
            tie_break = \"dbB\"
            full_scan_every = 0

            [[tables]]
            table_name = \"person\"
            primary_key = \"id\"
            include_columns = [\"name\", \"email\"]
            last_update_column = \"last_update\"

            [[tables]]
            table_name = \"audit\"
            primary_key = \"id\"
            active = false
            "
        );
        let settings = Settings::from_toml(&text, Path::new(".")).unwrap();
        assert_eq!(settings.tables.len(), 2);
        assert!(settings.tables[0].active);
        assert_eq!(settings.tables[0].tracking_column().as_deref(), Some("last_update"));
        assert!(!settings.tables[1].active);
        assert!(settings.tables[1].includes_all_columns());

        let config = settings.engine_config().unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.tie_break, TieBreak::Prefer(StoreId::B));
        assert_eq!(config.full_scan_every, 0);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let bad_tie = format!("{MINIMAL}\n[engine]\ntie_break = \"newest\"\n");
        assert!(Settings::from_toml(&bad_tie, Path::new(".")).is_err());

        let zero_interval = format!("{MINIMAL}\n[scheduler]\ninterval_ms = 0\n");
        assert!(Settings::from_toml(&zero_interval, Path::new(".")).is_err());

        let same_file = "[stores.a]\npath = \"x.db\"\n[stores.b]\npath = \"x.db\"\n";
        assert!(Settings::from_toml(same_file, Path::new(".")).is_err());

        assert!(Settings::from_toml("[stores]\n", Path::new(".")).is_err());
    }

    #[test]
    fn builds_an_engine_over_file_stores() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tablesync.toml");
        std::fs::write(
            &path,
            r#"
            [stores.a]
            path = "data/a.db"
            [stores.b]
            path = "data/b.db"
            [log]
            persist = true
            [[tables]]
            table_name = "person"
            primary_key = "id"
            "#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        for location in [&settings.stores.a, &settings.stores.b] {
            let store = SqliteStore::open(&location.path).unwrap();
            store.execute_batch(tablesync_testkit::PERSON_DDL).unwrap();
        }
        let seed = SqliteStore::open(&settings.stores.a.path).unwrap();
        tablesync_testkit::insert_person(&seed, 1, "Alice", "alice@demo", tablesync_testkit::fixed_time());
        drop(seed);

        let engine = settings.build_engine().unwrap();
        assert_eq!(engine.config_store().list().len(), 1);
        let report = engine.synchronize_all();
        assert!(report.failed_tables.is_empty());
        assert_eq!(report.tables[0].applied, 1);
        assert_eq!(engine.recent_logs(10).len(), 2);

        let b = SqliteStore::open(&settings.stores.b.path).unwrap();
        assert_eq!(tablesync_testkit::count_rows(&b, "person"), 1);
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = Settings::load(Path::new("/nonexistent/tablesync.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/tablesync.toml"));
    }
}
