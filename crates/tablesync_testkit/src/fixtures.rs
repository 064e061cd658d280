//! Test fixtures and store helpers.
//!
//! Provides SQLite stores with the `person` table used throughout the
//! tests, and wrappers that make a store fail on demand.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tablesync_protocol::{Row, TableSyncConfig, Value};
use tablesync_store::{SqlStore, SqliteStore, Statement, StoreError, StoreResult};
use tempfile::TempDir;

/// DDL of the `person` table.
pub const PERSON_DDL: &str = "CREATE TABLE IF NOT EXISTS person (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    last_update TIMESTAMP
)";

/// A fixed instant, so tests do not depend on the wall clock.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid fixed time")
}

/// Configuration of the `person` table: `id` key, `name` and `email`
/// compared, `last_update` as the tracking column.
pub fn person_config() -> TableSyncConfig {
    TableSyncConfig::new("person", "id")
        .with_include_columns(["name", "email", "last_update"])
        .with_last_update_column("last_update")
}

/// Builds a `person` row.
pub fn person_row(id: i64, name: &str, email: &str, last_update: DateTime<Utc>) -> Row {
    Row::new()
        .with("id", id)
        .with("name", name)
        .with("email", email)
        .with("last_update", last_update)
}

/// Opens an in-memory store with an empty `person` table.
pub fn person_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("Failed to open in-memory store");
    store
        .execute_batch(PERSON_DDL)
        .expect("Failed to create person table");
    store
}

/// Inserts a `person` row.
pub fn insert_person(
    store: &dyn SqlStore,
    id: i64,
    name: &str,
    email: &str,
    last_update: DateTime<Utc>,
) {
    store
        .execute(
            &Statement::new(
                "INSERT INTO person (id, name, email, last_update) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(last_update),
        )
        .expect("Failed to insert person");
}

/// Inserts an arbitrary row into `table`.
pub fn insert_row(store: &dyn SqlStore, table: &str, row: &Row) {
    let columns: Vec<&str> = row.column_names().collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    store
        .execute(
            &Statement::new(format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                columns.join(", ")
            ))
            .bind_all(columns.iter().map(|c| row.get_or_null(c).clone())),
        )
        .expect("Failed to insert row");
}

/// Updates a person's email and tracking timestamp.
pub fn update_email(store: &dyn SqlStore, id: i64, email: &str, last_update: DateTime<Utc>) {
    store
        .execute(
            &Statement::new("UPDATE person SET email = ?, last_update = ? WHERE id = ?")
                .bind(email)
                .bind(last_update)
                .bind(id),
        )
        .expect("Failed to update person");
}

/// Deletes a person.
pub fn delete_person(store: &dyn SqlStore, id: i64) {
    store
        .execute(&Statement::new("DELETE FROM person WHERE id = ?").bind(id))
        .expect("Failed to delete person");
}

/// Counts the rows of a table.
pub fn count_rows(store: &dyn SqlStore, table: &str) -> i64 {
    let rows = store
        .query(&Statement::new(format!("SELECT COUNT(*) AS n FROM {table}")))
        .expect("Failed to count rows");
    rows.first()
        .and_then(|row| row.get("n"))
        .and_then(Value::as_integer)
        .unwrap_or(0)
}

/// Reads the synchronized `person` columns, ordered by id.
pub fn person_rows(store: &dyn SqlStore) -> Vec<Row> {
    store
        .query(&Statement::new(
            "SELECT id, name, email, last_update FROM person ORDER BY id",
        ))
        .expect("Failed to read persons")
}

/// Reads every person's email, keyed by id.
pub fn emails(store: &dyn SqlStore) -> BTreeMap<i64, Option<String>> {
    store
        .query(&Statement::new("SELECT id, email FROM person"))
        .expect("Failed to read emails")
        .iter()
        .filter_map(|row| {
            let id = row.get("id")?.as_integer()?;
            let email = row.get("email").and_then(Value::as_text).map(str::to_string);
            Some((id, email))
        })
        .collect()
}

/// A file-backed store in a temporary directory.
pub struct TempStore {
    /// The store.
    pub store: SqliteStore,
    dir: TempDir,
}

impl TempStore {
    /// Creates a database file with an empty `person` table.
    pub fn person() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store =
            SqliteStore::open(&dir.path().join("store.db")).expect("Failed to open file store");
        store
            .execute_batch(PERSON_DDL)
            .expect("Failed to create person table");
        Self { store, dir }
    }

    /// Path of the database file.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("store.db")
    }
}

impl std::ops::Deref for TempStore {
    type Target = SqliteStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Wraps a store and makes it unreachable while switched offline.
#[derive(Debug)]
pub struct ToggleableStore<S> {
    inner: S,
    online: AtomicBool,
}

impl<S: SqlStore> ToggleableStore<S> {
    /// Wraps a store; it starts online.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            online: AtomicBool::new(true),
        }
    }

    /// Switches the store on or off.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns true if the store is reachable.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// The wrapped store, reachable regardless of the switch.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self) -> StoreResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("database offline".into()))
        }
    }
}

impl<S: SqlStore> SqlStore for ToggleableStore<S> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn query(&self, statement: &Statement) -> StoreResult<Vec<Row>> {
        self.check()?;
        self.inner.query(statement)
    }

    fn execute(&self, statement: &Statement) -> StoreResult<u64> {
        self.check()?;
        self.inner.execute(statement)
    }

    fn is_available(&self, timeout: Duration) -> bool {
        self.is_online() && self.inner.is_available(timeout)
    }
}

/// Wraps a store and fails a given number of write statements.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    failures_left: AtomicUsize,
    executes: AtomicUsize,
}

impl<S: SqlStore> FlakyStore<S> {
    /// Wraps a store that does not fail yet.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(0),
            executes: AtomicUsize::new(0),
        }
    }

    /// Makes the next `n` calls to `execute` fail with a retryable error.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Number of `execute` calls seen, failed ones included.
    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SqlStore> SqlStore for FlakyStore<S> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn query(&self, statement: &Statement) -> StoreResult<Vec<Row>> {
        self.inner.query(statement)
    }

    fn execute(&self, statement: &Statement) -> StoreResult<u64> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Timeout);
        }
        self.inner.execute(statement)
    }

    fn is_available(&self, timeout: Duration) -> bool {
        self.inner.is_available(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_helpers() {
        let store = person_store();
        insert_person(&store, 1, "Alice", "alice@demo", fixed_time());
        insert_person(&store, 2, "Bob", "bob@demo", fixed_time());
        update_email(&store, 2, "bob@new", fixed_time());
        delete_person(&store, 1);

        assert_eq!(count_rows(&store, "person"), 1);
        assert_eq!(emails(&store).get(&2), Some(&Some("bob@new".to_string())));
    }

    #[test]
    fn toggleable_store_goes_offline() {
        let store = ToggleableStore::new(person_store());
        store.set_online(false);
        let err = store.query(&Statement::new("SELECT 1")).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!store.is_available(Duration::from_millis(10)));

        store.set_online(true);
        assert!(store.query(&Statement::new("SELECT 1")).is_ok());
        assert!(store.is_available(Duration::from_millis(10)));
    }

    #[test]
    fn flaky_store_fails_then_recovers() {
        let store = FlakyStore::new(person_store());
        store.fail_next(2);
        let stmt = Statement::new("DELETE FROM person");
        assert!(store.execute(&stmt).is_err());
        assert!(store.execute(&stmt).is_err());
        assert!(store.execute(&stmt).is_ok());
        assert_eq!(store.executes(), 3);
    }

    #[test]
    fn temp_store_is_file_backed() {
        let temp = TempStore::person();
        insert_person(&*temp, 1, "Alice", "alice@demo", fixed_time());
        assert!(temp.path().exists());
        assert_eq!(count_rows(&*temp, "person"), 1);
    }
}
