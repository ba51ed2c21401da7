//! End-to-end coalescing flows through the public engine API.

use quell_core::engine::{CoalescingEngine, Disposition};
use quell_core::event::{TaskEvent, TaskState};
use quell_core::key::RouteSuffix;
use quell_core::{query, stats, store::KeyStore, threshold::ThresholdPolicy};

fn new_engine() -> CoalescingEngine {
    let store = KeyStore::open_in_memory("testing.prefix.").expect("open store");
    CoalescingEngine::new(store, Box::new(RouteSuffix::new("coalesce.v1.")))
}

fn pending(task_id: &str, key: &str) -> TaskEvent {
    TaskEvent {
        task_id: task_id.to_string(),
        run_id: 0,
        state: TaskState::Pending,
        routes: vec![format!("route.coalesce.v1.{key}")],
        provisioner_id: None,
        worker_type: None,
    }
}

fn terminal(task_id: &str) -> TaskEvent {
    TaskEvent {
        task_id: task_id.to_string(),
        run_id: 0,
        state: TaskState::Completed,
        routes: Vec::new(),
        provisioner_id: None,
        worker_type: None,
    }
}

#[test]
fn pending_count_is_inserts_minus_successful_removals() {
    let mut engine = new_engine();

    for id in ["a", "b", "c", "d"] {
        engine.handle(&pending(id, "builds")).expect("pending");
    }
    engine.handle(&terminal("b")).expect("terminal");
    engine.handle(&terminal("b")).expect("duplicate terminal");
    engine.handle(&terminal("ghost")).expect("unknown terminal");

    let store = engine.store();
    // 4 inserted, 1 successfully removed; unknown removals do not decrement.
    assert_eq!(store.counter(stats::PENDING_COUNT).expect("get"), 3);
    assert_eq!(store.counter(stats::UNKNOWN_TASKS).expect("get"), 2);
    assert_eq!(store.counter(stats::TOTAL_MSGS_HANDLED).expect("get"), 7);
}

#[test]
fn redelivery_counts_once_per_redundant_delivery() {
    let mut engine = new_engine();
    engine.handle(&pending("a", "builds")).expect("first");
    engine.handle(&pending("a", "builds")).expect("second");
    engine.handle(&pending("a", "builds")).expect("third");

    let store = engine.store();
    assert_eq!(store.list_range("builds").expect("range"), vec!["a"]);
    assert_eq!(store.counter(stats::TASKS_RERAN).expect("get"), 2);
    assert_eq!(store.counter(stats::PENDING_COUNT).expect("get"), 1);
}

#[test]
fn key_set_tracks_list_emptiness_through_full_flow() {
    let mut engine = new_engine();

    engine.handle(&pending("a", "k1")).expect("pending");
    engine.handle(&pending("b", "k1")).expect("pending");
    engine.handle(&pending("c", "k2")).expect("pending");
    assert_eq!(engine.store().known_keys().expect("keys"), vec!["k1", "k2"]);

    engine.handle(&terminal("a")).expect("terminal");
    assert_eq!(engine.store().known_keys().expect("keys"), vec!["k1", "k2"]);

    engine.handle(&terminal("b")).expect("terminal");
    assert_eq!(engine.store().known_keys().expect("keys"), vec!["k2"]);

    engine.handle(&terminal("c")).expect("terminal");
    assert!(engine.store().known_keys().expect("keys").is_empty());
    assert_eq!(engine.store().counter(stats::COALESCED_LISTS).expect("get"), 0);
}

#[test]
fn threshold_set_read_delete_roundtrip() {
    let engine = new_engine();
    let store = engine.store();

    let written = ThresholdPolicy { age: 3600, size: 5 };
    store.set_threshold("builds", written).expect("set");
    assert_eq!(
        query::threshold_for_key(store, "builds").expect("read"),
        Some(written)
    );

    assert!(store.delete_threshold("builds").expect("delete"));
    assert_eq!(query::threshold_for_key(store, "builds").expect("read"), None);
    // With no policy the key can never supersede, whatever its list looks like.
    let verdict = query::supersede_verdict(store, "builds", i64::MAX).expect("verdict");
    assert!(verdict.supersedes.is_empty());
}

#[test]
fn supersession_flow_with_engine_timestamps() {
    let mut engine = new_engine();
    const SEC_US: i64 = 1_000_000;

    engine.on_pending_at("c", "builds", 0).expect("insert");
    engine.on_pending_at("b", "builds", SEC_US).expect("insert");
    engine.on_pending_at("a", "builds", 2 * SEC_US).expect("insert");

    let store = engine.store();
    store
        .set_threshold("builds", ThresholdPolicy { age: 5, size: 2 })
        .expect("set");

    let verdict = query::supersede_verdict(store, "builds", 10 * SEC_US).expect("verdict");
    assert_eq!(verdict.supersedes, vec!["a", "b", "c"]);

    // The verdict is advisory: nothing was pruned by evaluating it.
    assert_eq!(store.list_range("builds").expect("range").len(), 3);
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("quell.db");

    {
        let store = KeyStore::open(&path, "testing.prefix.").expect("open");
        let mut engine =
            CoalescingEngine::new(store, Box::new(RouteSuffix::new("coalesce.v1.")));
        engine.handle(&pending("a", "builds")).expect("pending");
        engine.handle(&pending("b", "builds")).expect("pending");
    }

    // A fresh process resumes from persisted state, not an empty cache.
    let store = KeyStore::open(&path, "testing.prefix.").expect("reopen");
    let mut engine = CoalescingEngine::new(store, Box::new(RouteSuffix::new("coalesce.v1.")));
    assert_eq!(
        engine.store().list_range("builds").expect("range"),
        vec!["b", "a"]
    );
    assert_eq!(engine.store().counter(stats::PENDING_COUNT).expect("get"), 2);

    let disposition = engine.handle(&terminal("a")).expect("terminal");
    assert_eq!(
        disposition,
        Disposition::Removed {
            list_key: "builds".to_string()
        }
    );
    assert_eq!(engine.store().counter(stats::PENDING_COUNT).expect("get"), 1);
}
