//! Per-table synchronization configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised when a table configuration is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The table name is missing or blank.
    #[error("table name is required")]
    MissingTableName,

    /// The primary key column is missing or blank.
    #[error("primary key is required")]
    MissingPrimaryKey,

    /// A table or column name is not a plain SQL identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The table is already configured.
    #[error("table already configured: {0}")]
    Duplicate(String),
}

fn default_active() -> bool {
    true
}

/// Describes one table kept in sync between the two stores.
///
/// Table names compare case-insensitively and are the uniqueness key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSyncConfig {
    /// Table name.
    pub table_name: String,
    /// Primary key column.
    pub primary_key: String,
    /// Columns to fetch and compare. Empty or `*` means all columns.
    #[serde(default)]
    pub include_columns: Vec<String>,
    /// Change-tracking timestamp column used for watermarks and LWW.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_column: Option<String>,
    /// Whether the table takes part in `synchronize_all`.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Instant of the last successful sync of this table.
    #[serde(skip)]
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl TableSyncConfig {
    /// Creates an active configuration that syncs all columns.
    pub fn new(table_name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key: primary_key.into(),
            include_columns: Vec::new(),
            last_update_column: None,
            active: true,
            last_sync_time: None,
        }
    }

    /// Sets the included columns.
    pub fn with_include_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the change-tracking column.
    pub fn with_last_update_column(mut self, column: impl Into<String>) -> Self {
        self.last_update_column = Some(column.into());
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Lowercased table name, the uniqueness key.
    pub fn key(&self) -> String {
        self.table_name.to_lowercase()
    }

    /// Returns true if `name` refers to this table (case-insensitive).
    pub fn matches_name(&self, name: &str) -> bool {
        self.table_name.eq_ignore_ascii_case(name.trim())
    }

    /// Lowercased primary key column.
    pub fn primary_key_column(&self) -> String {
        self.primary_key.to_lowercase()
    }

    /// Lowercased change-tracking column, if any.
    pub fn tracking_column(&self) -> Option<String> {
        self.last_update_column
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(str::to_lowercase)
    }

    /// Returns true if every column is fetched and compared.
    pub fn includes_all_columns(&self) -> bool {
        self.include_columns.is_empty() || self.include_columns.iter().any(|c| c.trim() == "*")
    }

    /// Checks the configuration before it is stored.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(ConfigError::MissingTableName);
        }
        if self.primary_key.trim().is_empty() {
            return Err(ConfigError::MissingPrimaryKey);
        }
        check_identifier(&self.table_name)?;
        check_identifier(&self.primary_key)?;
        if let Some(column) = &self.last_update_column {
            check_identifier(column)?;
        }
        for column in &self.include_columns {
            if column.trim() != "*" {
                check_identifier(column)?;
            }
        }
        Ok(())
    }
}

impl PartialEq for TableSyncConfig {
    fn eq(&self, other: &Self) -> bool {
        self.matches_name(&other.table_name)
    }
}

impl Eq for TableSyncConfig {}

fn check_identifier(name: &str) -> ConfigResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}

/// Returns true for a plain SQL identifier, optionally schema-qualified.
///
/// Each dot-separated part must start with a letter or `_` and contain only
/// ASCII letters, digits and `_`. Names are interpolated into statements,
/// so nothing else is accepted.
pub fn is_valid_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_accessors() {
        let config = TableSyncConfig::new("Person", "ID")
            .with_include_columns(["name", "email"])
            .with_last_update_column("Last_Update");

        assert_eq!(config.key(), "person");
        assert_eq!(config.primary_key_column(), "id");
        assert_eq!(config.tracking_column().as_deref(), Some("last_update"));
        assert!(config.active);
        assert!(!config.includes_all_columns());
        assert!(config.matches_name("PERSON"));
    }

    #[test]
    fn star_or_empty_includes_everything() {
        assert!(TableSyncConfig::new("t", "id").includes_all_columns());
        assert!(TableSyncConfig::new("t", "id")
            .with_include_columns(["*"])
            .includes_all_columns());
    }

    #[test]
    fn validation_rejects_blank_fields() {
        assert_eq!(
            TableSyncConfig::new("  ", "id").validate(),
            Err(ConfigError::MissingTableName)
        );
        assert_eq!(
            TableSyncConfig::new("person", "").validate(),
            Err(ConfigError::MissingPrimaryKey)
        );
        assert!(TableSyncConfig::new("person", "id").validate().is_ok());
    }

    #[test]
    fn validation_rejects_unsafe_identifiers() {
        let config = TableSyncConfig::new("person; DROP TABLE x", "id");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIdentifier(_))
        ));

        let config = TableSyncConfig::new("person", "id").with_include_columns(["name", "e mail"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIdentifier(_))
        ));

        assert!(is_valid_identifier("main.person"));
        assert!(is_valid_identifier("_tmp1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("a.b.c"));
    }

    #[test]
    fn equality_is_case_insensitive_by_table() {
        let a = TableSyncConfig::new("Person", "id");
        let b = TableSyncConfig::new("person", "other");
        assert_eq!(a, b);
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"table_name":"person","primary_key":"id"}"#;
        let config: TableSyncConfig = serde_json::from_str(json).unwrap();
        assert!(config.active);
        assert!(config.include_columns.is_empty());
        assert!(config.last_update_column.is_none());
        assert!(config.last_sync_time.is_none());
    }
}
