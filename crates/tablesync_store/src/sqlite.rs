//! SQLite store backend.

use crate::backend::SqlStore;
use crate::error::{StoreError, StoreResult};
use crate::statement::Statement;
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tablesync_protocol::{format_timestamp, parse_timestamp, Row, Value};
use tracing::{debug, trace};

/// Busy timeout applied when no settings are given.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreSettings {
    /// Sets the busy timeout.
    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// A store backed by one SQLite connection.
///
/// The connection is guarded by a mutex, so statements from different
/// threads are serialized.
///
/// # Value mapping
///
/// | column | read as |
/// |---|---|
/// | `NULL` | `Value::Null` |
/// | integer, declared `BOOL*` | `Value::Bool` |
/// | integer | `Value::Integer` |
/// | real | `Value::Float` |
/// | text, declared `TIMESTAMP`/`DATETIME`/`DATE` | `Value::Timestamp` when it parses |
/// | text | `Value::Text` |
/// | blob | conversion error |
///
/// Booleans are written as `0`/`1` and timestamps as fixed-width UTC text.
///
/// # Example
///
/// ```rust
/// use tablesync_store::{SqlStore, SqliteStore, Statement};
///
/// let store = SqliteStore::open_in_memory().unwrap();
/// let rows = store.query(&Statement::new("SELECT 1 AS One")).unwrap();
/// assert_eq!(rows[0].get("one").and_then(|v| v.as_integer()), Some(1));
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    id: String,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates a database file with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_settings(path, &StoreSettings::default())
    }

    /// Opens or creates a database file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_settings(path: &Path, settings: &StoreSettings) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::from_connection(path.display().to_string(), conn, settings)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(":memory:".to_string(), conn, &StoreSettings::default())
    }

    fn from_connection(id: String, conn: Connection, settings: &StoreSettings) -> StoreResult<Self> {
        conn.busy_timeout(settings.busy_timeout)?;
        debug!(store = %id, busy_timeout_ms = settings.busy_timeout.as_millis() as u64, "opened sqlite store");
        Ok(Self {
            id,
            conn: Mutex::new(conn),
        })
    }

    /// Runs one or more statements without parameters, such as DDL.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

impl SqlStore for SqliteStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn query(&self, statement: &Statement) -> StoreResult<Vec<Row>> {
        trace!(store = %self.id, sql = %statement, "query");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&statement.sql)?;
        let columns: Vec<(String, Option<String>)> = stmt
            .columns()
            .iter()
            .map(|c| {
                (
                    c.name().to_lowercase(),
                    c.decl_type().map(str::to_ascii_uppercase),
                )
            })
            .collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(
            statement.params.iter().map(to_sql),
        ))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut fetched = Row::new();
            for (index, (name, decl_type)) in columns.iter().enumerate() {
                let value = from_sql(row.get_ref(index)?, decl_type.as_deref(), name)?;
                fetched.insert(name, value);
            }
            out.push(fetched);
        }
        Ok(out)
    }

    fn execute(&self, statement: &Statement) -> StoreResult<u64> {
        trace!(store = %self.id, sql = %statement, "execute");
        let conn = self.conn.lock();
        let affected = conn.execute(
            &statement.sql,
            rusqlite::params_from_iter(statement.params.iter().map(to_sql)),
        )?;
        Ok(affected as u64)
    }

    fn is_available(&self, timeout: Duration) -> bool {
        match self.conn.try_lock_for(timeout) {
            Some(conn) => conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .is_ok(),
            None => false,
        }
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(x) => SqlValue::Real(*x),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Timestamp(ts) => SqlValue::Text(format_timestamp(ts)),
    }
}

fn from_sql(value: ValueRef<'_>, decl_type: Option<&str>, column: &str) -> StoreResult<Value> {
    let declared = decl_type.unwrap_or_default();
    let is_bool = declared.starts_with("BOOL");
    let is_temporal = declared.contains("TIMESTAMP") || declared.contains("DATE");

    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if is_bool => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(x) => Value::Float(x),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| StoreError::Conversion(format!("column {column}: {e}")))?;
            match is_temporal.then(|| parse_timestamp(text)).flatten() {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Text(text.to_string()),
            }
        }
        ValueRef::Blob(_) => {
            return Err(StoreError::Conversion(format!(
                "column {column}: blob values are not supported"
            )))
        }
    })
}
