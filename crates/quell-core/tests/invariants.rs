//! Property tests: the engine agrees with a naive in-memory model over
//! arbitrary pending/terminal sequences.

use std::collections::BTreeMap;

use proptest::prelude::*;
use quell_core::engine::CoalescingEngine;
use quell_core::key::RouteSuffix;
use quell_core::{stats, store::KeyStore};

#[derive(Debug, Clone)]
enum Op {
    Pending { task: u8, key: u8 },
    Terminal { task: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..12u8, 0..4u8).prop_map(|(task, key)| Op::Pending { task, key }),
        (0..12u8).prop_map(|task| Op::Terminal { task }),
    ]
}

/// Straight-line model of the tracking semantics: per-key insertion-order
/// lists plus a task -> key index.
#[derive(Default)]
struct Model {
    lists: BTreeMap<String, Vec<String>>,
    tracked: BTreeMap<String, String>,
    reran: i64,
    unknown: i64,
}

impl Model {
    fn pending(&mut self, task: &str, key: &str) {
        if self.tracked.contains_key(task) {
            self.reran += 1;
            return;
        }
        self.lists.entry(key.to_string()).or_default().push(task.to_string());
        self.tracked.insert(task.to_string(), key.to_string());
    }

    fn terminal(&mut self, task: &str) {
        let Some(key) = self.tracked.remove(task) else {
            self.unknown += 1;
            return;
        };
        let list = self.lists.get_mut(&key).expect("tracked key has a list");
        let index = list.iter().position(|id| id == task).expect("member");
        list.remove(index);
        if list.is_empty() {
            self.lists.remove(&key);
        }
    }
}

proptest! {
    #[test]
    fn engine_matches_model(ops in prop::collection::vec(op_strategy(), 0..80)) {
        let store = KeyStore::open_in_memory("testing.prefix.").expect("open");
        let mut engine = CoalescingEngine::new(store, Box::new(RouteSuffix::new("p.")));
        let mut model = Model::default();

        for op in &ops {
            match op {
                Op::Pending { task, key } => {
                    let task = format!("t{task}");
                    let key = format!("k{key}");
                    engine.on_pending_at(&task, &key, 0).expect("pending");
                    model.pending(&task, &key);
                }
                Op::Terminal { task } => {
                    let task = format!("t{task}");
                    engine.on_terminal(&task).expect("terminal");
                    model.terminal(&task);
                }
            }
        }

        let store = engine.store();

        // A key is known iff its list is non-empty.
        let expected_keys: Vec<String> = model.lists.keys().cloned().collect();
        prop_assert_eq!(store.known_keys().expect("keys"), expected_keys);

        for (key, list) in &model.lists {
            // Engine range reads are newest-first; the model appends.
            let expected: Vec<String> = list.iter().rev().cloned().collect();
            prop_assert_eq!(store.list_range(key).expect("range"), expected);
        }

        // Every listed id resolves to a tracked task with a timestamp, and
        // every tracked task is in exactly the list it was captured under.
        for (task, key) in &model.tracked {
            let tracked = store.pending_task(task).expect("get").expect("tracked");
            prop_assert_eq!(&tracked.list_key, key);
        }

        let expected_pending = i64::try_from(model.tracked.len()).expect("fits");
        prop_assert_eq!(store.counter(stats::PENDING_COUNT).expect("get"), expected_pending);
        prop_assert_eq!(store.counter(stats::TASKS_RERAN).expect("get"), model.reran);
        prop_assert_eq!(store.counter(stats::UNKNOWN_TASKS).expect("get"), model.unknown);
    }
}
