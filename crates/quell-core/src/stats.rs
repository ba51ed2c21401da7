//! Named, persisted service counters.
//!
//! Counters live in the store's `counters` table so a restart resumes prior
//! history. The engine and reconciler bump them inside the same transaction
//! as the mutation they describe; readers take a [`snapshot`].

use std::collections::BTreeMap;

use crate::store::{KeyStore, StoreError};

/// Number of tasks currently tracked as pending.
pub const PENDING_COUNT: &str = "pending_count";
/// Number of non-empty coalesce lists.
pub const COALESCED_LISTS: &str = "coalesced_lists";
/// Terminal events for tasks that were never tracked.
pub const UNKNOWN_TASKS: &str = "unknown_tasks";
/// Redundant pending deliveries for tasks already tracked.
pub const TASKS_RERAN: &str = "tasks_reran";
/// Total events processed, regardless of disposition.
pub const TOTAL_MSGS_HANDLED: &str = "total_msgs_handled";

/// All counter names, in reporting order.
pub const ALL: [&str; 5] = [
    PENDING_COUNT,
    COALESCED_LISTS,
    UNKNOWN_TASKS,
    TASKS_RERAN,
    TOTAL_MSGS_HANDLED,
];

/// Ensure every counter has a persisted row, preserving existing values.
///
/// Run once at startup so the query surface always reports the full set.
///
/// # Errors
///
/// Returns an error if the store write fails.
pub fn seed(store: &mut KeyStore) -> Result<(), StoreError> {
    store.mutate(|ops| {
        for name in ALL {
            let current = ops.counter_get(name)?;
            ops.counter_set(name, current)?;
        }
        Ok(())
    })
}

/// Snapshot of every known counter. Names never written read as 0.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn snapshot(store: &KeyStore) -> Result<BTreeMap<String, i64>, StoreError> {
    let mut counters = store.counters()?;
    for name in ALL {
        counters.entry(name.to_string()).or_insert(0);
    }
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_includes_all_names_with_zero_defaults() {
        let store = KeyStore::open_in_memory("testing.prefix.").expect("open");
        let snap = snapshot(&store).expect("snapshot");
        for name in ALL {
            assert_eq!(snap.get(name), Some(&0), "missing counter {name}");
        }
    }

    #[test]
    fn seed_preserves_existing_values() {
        let mut store = KeyStore::open_in_memory("testing.prefix.").expect("open");
        store.ops().counter_set(UNKNOWN_TASKS, 12).expect("set");

        seed(&mut store).expect("seed");

        assert_eq!(store.counter(UNKNOWN_TASKS).expect("get"), 12);
        assert_eq!(store.counter(PENDING_COUNT).expect("get"), 0);
        // Seeding materializes rows for every name.
        assert_eq!(store.counters().expect("all").len(), ALL.len());
    }
}
