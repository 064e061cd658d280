//! Table configuration store.

use crate::error::EngineResult;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tablesync_protocol::{ConfigError, ConfigResult, TableSyncConfig};
use tracing::{debug, info};

/// Source of table configurations for the engine.
pub trait ConfigStore: Send + Sync {
    /// All configured tables, sorted by name (case-insensitive).
    fn list(&self) -> Vec<Arc<TableSyncConfig>>;

    /// Looks up one table by name (case-insensitive).
    fn find_by_name(&self, name: &str) -> Option<Arc<TableSyncConfig>>;

    /// Records the instant of a successful sync of `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    fn update_last_sync_time(&self, name: &str, at: DateTime<Utc>) -> EngineResult<()>;
}

/// In-memory configuration store keyed by lowercased table name.
///
/// Configurations are immutable snapshots; updating one replaces the
/// `Arc`, so operations already queued keep the configuration they were
/// created with.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: RwLock<BTreeMap<String, Arc<TableSyncConfig>>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given configurations.
    ///
    /// # Errors
    ///
    /// Returns the first validation or duplicate error.
    pub fn from_configs(configs: impl IntoIterator<Item = TableSyncConfig>) -> ConfigResult<Self> {
        let store = Self::new();
        for config in configs {
            store.create(config)?;
        }
        Ok(store)
    }

    /// Adds a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the table is
    /// already configured.
    pub fn create(&self, config: TableSyncConfig) -> ConfigResult<Arc<TableSyncConfig>> {
        config.validate()?;
        let key = config.key();
        let mut configs = self.configs.write();
        if configs.contains_key(&key) {
            return Err(ConfigError::Duplicate(config.table_name));
        }
        info!(table = %config.table_name, primary_key = %config.primary_key, "table configured");
        let config = Arc::new(config);
        configs.insert(key, Arc::clone(&config));
        Ok(config)
    }

    /// Removes a table. Returns true if it was configured.
    pub fn delete(&self, name: &str) -> bool {
        let removed = self
            .configs
            .write()
            .remove(&name.trim().to_lowercase())
            .is_some();
        if removed {
            info!(table = name, "table removed");
        }
        removed
    }

    /// Enables or disables a table. Returns true if it was configured.
    pub fn set_active(&self, name: &str, active: bool) -> bool {
        self.replace(name, |config| config.active = active)
    }

    /// Number of configured tables.
    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    /// Returns true if no table is configured.
    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }

    fn replace(&self, name: &str, change: impl FnOnce(&mut TableSyncConfig)) -> bool {
        let mut configs = self.configs.write();
        match configs.get_mut(&name.trim().to_lowercase()) {
            Some(slot) => {
                let mut updated = (**slot).clone();
                change(&mut updated);
                *slot = Arc::new(updated);
                true
            }
            None => false,
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn list(&self) -> Vec<Arc<TableSyncConfig>> {
        self.configs.read().values().cloned().collect()
    }

    fn find_by_name(&self, name: &str) -> Option<Arc<TableSyncConfig>> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.configs.read().get(&name.to_lowercase()).cloned()
    }

    fn update_last_sync_time(&self, name: &str, at: DateTime<Utc>) -> EngineResult<()> {
        if !self.replace(name, |config| config.last_sync_time = Some(at)) {
            debug!(table = name, "not configured, last sync time not recorded");
        }
        Ok(())
    }
}
