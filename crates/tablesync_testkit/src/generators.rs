//! Property-based test generators using proptest.
//!
//! Provides strategies for `person` rows and row sets with unique keys.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use tablesync_protocol::Row;

use crate::fixtures::fixed_time;

/// Strategy for timestamps within a day of [`fixed_time`], at whole
/// microseconds so they survive a round trip through a store.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (-86_400_000_000i64..86_400_000_000).prop_map(|micros| fixed_time() + Duration::microseconds(micros))
}

/// Strategy for a `person` row with the given id.
pub fn person_row_strategy(id: i64) -> impl Strategy<Value = Row> {
    (
        "[A-Z][a-z]{1,8}",
        prop::option::of("[a-z]{1,8}@[a-z]{1,6}\\.test"),
        timestamp_strategy(),
    )
        .prop_map(move |(name, email, last_update)| {
            Row::new()
                .with("id", id)
                .with("name", name)
                .with("email", email)
                .with("last_update", last_update)
        })
}

/// Strategy for up to `max` `person` rows with distinct ids in `1..=100`.
pub fn person_rows_strategy(max: usize) -> impl Strategy<Value = Vec<Row>> {
    prop::collection::btree_set(1i64..=100, 0..=max).prop_flat_map(|ids| {
        ids.into_iter()
            .map(person_row_strategy)
            .collect::<Vec<_>>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_protocol::Value;

    proptest! {
        #[test]
        fn person_rows_have_unique_ids(rows in person_rows_strategy(20)) {
            let ids: std::collections::BTreeSet<_> = rows
                .iter()
                .map(|row| row.get("id").and_then(Value::as_integer))
                .collect();
            prop_assert_eq!(ids.len(), rows.len());
        }
    }
}
