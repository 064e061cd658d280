//! Property tests: one pass makes both stores agree on A's keys, and the
//! next pass finds nothing to do.

use proptest::prelude::*;
use std::sync::Arc;
use tablesync_engine::{EngineConfig, ManualClock, MemoryConfigStore, SyncEngine, SyncLogService};
use tablesync_protocol::{Row, StoreId, TieBreak, Value};
use tablesync_store::SqliteStore;
use tablesync_testkit::{
    fixed_time, insert_row, person_config, person_rows, person_rows_strategy, person_store,
};

fn seeded(rows: &[Row]) -> Arc<SqliteStore> {
    let store = person_store();
    for row in rows {
        insert_row(&store, "person", row);
    }
    Arc::new(store)
}

fn ids(rows: &[Row]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_integer))
        .collect();
    ids.sort_unstable();
    ids
}

fn engine(a: Arc<SqliteStore>, b: Arc<SqliteStore>) -> SyncEngine {
    let configs = Arc::new(MemoryConfigStore::from_configs([person_config()]).unwrap());
    let log = Arc::new(SyncLogService::in_memory(500));
    // Equal timestamps with different contents would swap sides forever
    // under the bidirectional default.
    let config = EngineConfig::default().with_tie_break(TieBreak::Prefer(StoreId::A));
    SyncEngine::new(a, b, configs, log)
        .with_engine_config(config)
        .with_clock(Arc::new(ManualClock::new(fixed_time())))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn one_pass_converges_on_the_keys_of_a(
        seed_a in person_rows_strategy(20),
        seed_b in person_rows_strategy(20),
    ) {
        let (a, b) = (seeded(&seed_a), seeded(&seed_b));
        let engine = engine(a.clone(), b.clone());

        let first = engine.synchronize_all();
        prop_assert!(first.failed_tables.is_empty());
        prop_assert!(first.tables[0].complete);

        let rows_a = person_rows(a.as_ref());
        prop_assert_eq!(&rows_a, &person_rows(b.as_ref()));
        prop_assert_eq!(ids(&rows_a), ids(&seed_a));
        prop_assert_eq!(engine.pending_count(StoreId::A), 0);
        prop_assert_eq!(engine.pending_count(StoreId::B), 0);

        let second = engine.synchronize_all();
        prop_assert_eq!(second.tables[0].queued, 0);
        prop_assert_eq!(person_rows(a.as_ref()), rows_a.clone());
        prop_assert_eq!(person_rows(b.as_ref()), rows_a);
    }
}
