//! Row fetching.
//!
//! Reads the configured columns of one table from one store, optionally
//! limited to rows changed since a watermark.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::Duration;
use tablesync_protocol::{Row, RowSet, TableSyncConfig, Value};
use tablesync_store::{SqlStore, Statement, StoreResult};
use tracing::{debug, warn};

/// How far before the watermark an incremental fetch starts, to cover
/// clock skew between the engine and the stores.
pub const WATERMARK_SLACK: Duration = Duration::from_secs(5);

/// Maximum number of keys bound into one lookup statement.
const KEY_LOOKUP_CHUNK: usize = 500;

/// Builds the column list: included columns plus the primary key and the
/// tracking column, lowercased, deduplicated and sorted. `*` when the
/// configuration includes every column.
fn select_list(config: &TableSyncConfig) -> String {
    if config.includes_all_columns() {
        return "*".to_string();
    }
    let mut columns: BTreeSet<String> = config
        .include_columns
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| c != "*" && !c.is_empty())
        .collect();
    columns.insert(config.primary_key_column());
    if let Some(tracking) = config.tracking_column() {
        columns.insert(tracking);
    }
    columns.into_iter().collect::<Vec<_>>().join(", ")
}

/// Builds the `SELECT` for one table.
///
/// With a tracking column and a watermark, only rows whose tracking value
/// is at or after `watermark - WATERMARK_SLACK` are selected.
pub fn build_select(config: &TableSyncConfig, watermark: Option<DateTime<Utc>>) -> Statement {
    let sql = format!("SELECT {} FROM {}", select_list(config), config.table_name);
    match (config.tracking_column(), watermark) {
        (Some(tracking), Some(watermark)) => {
            let slack = chrono::Duration::from_std(WATERMARK_SLACK)
                .unwrap_or_else(|_| chrono::Duration::zero());
            Statement::new(format!("{sql} WHERE {tracking} >= ?")).bind(watermark - slack)
        }
        _ => Statement::new(sql),
    }
}

/// Fetches the rows of one table, propagating store errors.
///
/// # Errors
///
/// Returns the store's error if the query fails.
pub fn try_fetch_rows(
    store: &dyn SqlStore,
    config: &TableSyncConfig,
    watermark: Option<DateTime<Utc>>,
) -> StoreResult<RowSet> {
    let statement = build_select(config, watermark);
    let rows = store.query(&statement)?;
    debug!(
        store = store.id(),
        table = %config.table_name,
        rows = rows.len(),
        incremental = watermark.is_some(),
        "fetched rows"
    );
    Ok(RowSet::from_rows(rows, &config.primary_key_column()))
}

/// Fetches the rows of one table; any store error yields an empty set.
pub fn fetch_rows(
    store: &dyn SqlStore,
    config: &TableSyncConfig,
    watermark: Option<DateTime<Utc>>,
) -> RowSet {
    try_fetch_rows(store, config, watermark).unwrap_or_else(|e| {
        warn!(store = store.id(), table = %config.table_name, error = %e, "failed to fetch rows");
        RowSet::new()
    })
}

/// Fetches specific rows by primary key, ignoring the watermark.
///
/// Used to complete an incremental fetch: a key changed on one side only
/// must be compared against the other side's current row.
///
/// # Errors
///
/// Returns the store's error if any lookup fails.
pub fn fetch_rows_by_key(
    store: &dyn SqlStore,
    config: &TableSyncConfig,
    keys: &[Value],
) -> StoreResult<Vec<Row>> {
    let keys: Vec<&Value> = keys.iter().filter(|k| !k.is_null()).collect();
    let mut rows = Vec::new();
    for chunk in keys.chunks(KEY_LOOKUP_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let statement = Statement::new(format!(
            "SELECT {} FROM {} WHERE {} IN ({placeholders})",
            select_list(config),
            config.table_name,
            config.primary_key_column(),
        ))
        .bind_all(chunk.iter().map(|k| (*k).clone()));
        rows.extend(store.query(&statement)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tablesync_store::SqliteStore;

    fn person_config() -> TableSyncConfig {
        TableSyncConfig::new("person", "ID")
            .with_include_columns(["Name", "email", "name"])
            .with_last_update_column("last_update")
    }

    #[test]
    fn select_prunes_and_sorts_columns() {
        let stmt = build_select(&person_config(), None);
        assert_eq!(stmt.sql, "SELECT email, id, last_update, name FROM person");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn select_star_when_all_columns() {
        let config = TableSyncConfig::new("person", "id").with_include_columns(["*"]);
        assert_eq!(build_select(&config, None).sql, "SELECT * FROM person");
        let config = TableSyncConfig::new("person", "id");
        assert_eq!(build_select(&config, None).sql, "SELECT * FROM person");
    }

    #[test]
    fn watermark_is_bound_with_slack() {
        let watermark = Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 5).unwrap();
        let stmt = build_select(&person_config(), Some(watermark));
        assert!(stmt.sql.ends_with("WHERE last_update >= ?"));
        assert_eq!(
            stmt.params,
            vec![Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap()
            )]
        );
    }

    #[test]
    fn watermark_ignored_without_tracking_column() {
        let config = TableSyncConfig::new("person", "id");
        let stmt = build_select(&config, Some(Utc::now()));
        assert!(!stmt.sql.contains("WHERE"));
    }

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT, email TEXT, last_update TIMESTAMP);
                 INSERT INTO person VALUES (1, 'Alice', 'alice@demo', '2024-01-01 00:00:00');
                 INSERT INTO person VALUES (2, 'Bob', 'bob@demo', '2024-03-01 00:00:00');",
            )
            .unwrap();
        store
    }

    #[test]
    fn fetch_indexes_by_primary_key() {
        let store = seeded_store();
        let rows = fetch_rows(&store, &person_config(), None);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows.get(&Value::Integer(2)).unwrap().get("email"),
            Some(&Value::from("bob@demo"))
        );
    }

    #[test]
    fn incremental_fetch_filters_old_rows() {
        let store = seeded_store();
        let watermark = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let rows = fetch_rows(&store, &person_config(), Some(watermark));
        assert_eq!(rows.keys().cloned().collect::<Vec<_>>(), vec![Value::Integer(2)]);
    }

    #[test]
    fn fetch_errors_become_empty_sets() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(fetch_rows(&store, &person_config(), None).is_empty());
        assert!(try_fetch_rows(&store, &person_config(), None).is_err());
    }

    #[test]
    fn lookup_by_key_skips_nulls() {
        let store = seeded_store();
        let rows = fetch_rows_by_key(
            &store,
            &person_config(),
            &[Value::Integer(1), Value::Null, Value::Integer(9)],
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("Alice")));

        assert!(fetch_rows_by_key(&store, &person_config(), &[]).unwrap().is_empty());
    }
}
