//! The coalescing engine: classifies inbound events and maintains the
//! per-key pending lists.
//!
//! Each mutation group (list + key set + task index + counters) runs in one
//! store transaction, so concurrent readers and the reconciler observe it
//! as a unit. The durable store is the only source of truth; the engine
//! keeps no in-process pending map and can be restarted at any point.

use chrono::Utc;
use tracing::{debug, warn};

use crate::event::{TaskEvent, Transition};
use crate::key::DeriveKey;
use crate::stats;
use crate::store::{KeyStore, StoreError};

/// What the engine did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Pending task inserted into its coalesce list.
    Inserted { list_key: String },
    /// Pending re-delivery for a task already tracked; counted, no new state.
    Rerun,
    /// Pending event carrying no derivable coalesce key; not tracked.
    NoCoalesceKey,
    /// Terminal event removed the task from its list.
    Removed { list_key: String },
    /// Terminal event for a task that was never tracked; counted only.
    Unknown,
    /// Recognized list-neutral state (`running`).
    Observed,
    /// Retry run (`runId != 0`); retries are not first-run coalescing
    /// candidates and are skipped before any side effect.
    SkippedRerun,
}

/// Event-driven owner of the pending-task index.
pub struct CoalescingEngine {
    store: KeyStore,
    derive: Box<dyn DeriveKey + Send>,
}

impl CoalescingEngine {
    /// Build an engine over `store` with the given key-derivation strategy.
    #[must_use]
    pub fn new(store: KeyStore, derive: Box<dyn DeriveKey + Send>) -> Self {
        Self { store, derive }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    /// Tear down the engine, returning the store.
    #[must_use]
    pub fn into_store(self) -> KeyStore {
        self.store
    }

    /// Process one decoded event.
    ///
    /// The caller (the bus consumer) must acknowledge the delivery only
    /// after this returns `Ok`; an `Err` means the store rejected the
    /// mutation and nothing was applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn handle(&mut self, event: &TaskEvent) -> Result<Disposition, StoreError> {
        if event.run_id != 0 {
            debug!(task_id = %event.task_id, run_id = event.run_id, "skipping retry run");
            return Ok(Disposition::SkippedRerun);
        }

        let disposition = match event.state.transition() {
            Transition::Pending => match self.derive.derive(event) {
                Some(list_key) => self.on_pending(&event.task_id, &list_key)?,
                None => {
                    debug!(task_id = %event.task_id, "pending event has no coalesce key");
                    Disposition::NoCoalesceKey
                }
            },
            Transition::Terminal => self.on_terminal(&event.task_id)?,
            Transition::Observed => Disposition::Observed,
        };

        self.store
            .mutate(|ops| ops.counter_incr(stats::TOTAL_MSGS_HANDLED))?;
        debug!(task_id = %event.task_id, state = %event.state, ?disposition, "handled event");
        Ok(disposition)
    }

    /// Insert a pending task under `list_key`, timestamped now.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn on_pending(&mut self, task_id: &str, list_key: &str) -> Result<Disposition, StoreError> {
        self.on_pending_at(task_id, list_key, Utc::now().timestamp_micros())
    }

    /// Insert a pending task with an explicit insertion timestamp.
    ///
    /// Idempotent under at-least-once delivery: a task already tracked only
    /// bumps `tasks_reran` and leaves its list entry and timestamp alone.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn on_pending_at(
        &mut self,
        task_id: &str,
        list_key: &str,
        now_us: i64,
    ) -> Result<Disposition, StoreError> {
        let list_key = list_key.to_string();
        self.store.mutate(|ops| {
            if let Some(existing) = ops.pending_task_get(task_id)? {
                debug!(
                    task_id,
                    list_key = %existing.list_key,
                    "pending re-delivery for tracked task"
                );
                ops.counter_incr(stats::TASKS_RERAN)?;
                return Ok(Disposition::Rerun);
            }

            ops.keys_add(&list_key)?;
            ops.list_append(&list_key, task_id)?;
            ops.pending_task_put(task_id, &list_key, now_us)?;
            ops.counter_set(stats::PENDING_COUNT, ops.pending_count()?)?;
            ops.counter_set(stats::COALESCED_LISTS, ops.keys_count()?)?;
            Ok(Disposition::Inserted { list_key })
        })
    }

    /// Remove a task on its terminal event.
    ///
    /// The coalesce key is the one captured at insertion time; terminal
    /// events may not carry the attributes needed to re-derive it. An
    /// untracked task only bumps `unknown_tasks`: it signals a missed
    /// pending event, a duplicate terminal delivery, or a task that was
    /// queued before this service started.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn on_terminal(&mut self, task_id: &str) -> Result<Disposition, StoreError> {
        self.store.mutate(|ops| {
            let Some(task) = ops.pending_task_get(task_id)? else {
                ops.counter_incr(stats::UNKNOWN_TASKS)?;
                return Ok(Disposition::Unknown);
            };

            if !ops.list_remove_single(&task.list_key, task_id)? {
                // Tracked but absent from its list: repairable drift, not fatal.
                warn!(task_id, list_key = %task.list_key, "tracked task missing from its list");
            }
            ops.pending_task_delete(task_id)?;
            if ops.list_len(&task.list_key)? == 0 {
                ops.keys_remove(&task.list_key)?;
            }
            ops.counter_set(stats::PENDING_COUNT, ops.pending_count()?)?;
            ops.counter_set(stats::COALESCED_LISTS, ops.keys_count()?)?;
            Ok(Disposition::Removed {
                list_key: task.list_key,
            })
        })
    }
}

impl std::fmt::Debug for CoalescingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingEngine")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
