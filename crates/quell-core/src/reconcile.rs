//! Background reconciliation against the task-status oracle.
//!
//! Some tasks never get a terminal event (lost message, crashed producer).
//! Left alone they inflate list sizes and make age thresholds fire on
//! phantoms. The reconciler periodically asks the external status oracle
//! about every tracked id and evicts the ones that are definitively no
//! longer pending.
//!
//! Eviction fails open: an oracle timeout or transport error means the task
//! *might* still be pending, so it stays. Only a store failure aborts a
//! sweep, and the next scheduled run retries from scratch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::stats;
use crate::store::{KeyStore, StoreError};

/// What the oracle knows about a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLiveness {
    /// Definitively still pending; keep it.
    Pending,
    /// Definitively past pending (finished, cancelled, or unknown to the
    /// queue); safe to evict.
    Settled,
    /// Timeout or transport error; keep it, never evict on uncertainty.
    Uncertain,
}

/// Capability handle onto the external task-status service.
///
/// Implementations own the transport (and its bounded timeout); a lookup
/// must map a definitive "not found" to [`TaskLiveness::Settled`] and any
/// failure to [`TaskLiveness::Uncertain`].
pub trait StatusOracle {
    /// Report whether `task_id` is still pending.
    fn liveness(&self, task_id: &str) -> TaskLiveness;
}

/// Counts from one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Coalesce keys inspected.
    pub keys_scanned: usize,
    /// Task ids evicted as no longer pending.
    pub tasks_removed: usize,
    /// Keys removed because their list emptied.
    pub keys_removed: usize,
}

/// Periodic sweep over the store, evicting settled tasks.
pub struct Reconciler<O> {
    store: KeyStore,
    oracle: O,
}

impl<O: StatusOracle> Reconciler<O> {
    /// Build a reconciler over its own store handle.
    ///
    /// The handle must be separate from the event consumer's: both run
    /// concurrently, and WAL mode plus per-group transactions keep them
    /// serialized per key.
    #[must_use]
    pub fn new(store: KeyStore, oracle: O) -> Self {
        Self { store, oracle }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    /// Run one full sweep.
    ///
    /// Oracle lookups happen outside the write transaction so a slow oracle
    /// only delays this sweep, never event ingestion. Each eviction group
    /// re-checks task state inside its transaction: a terminal event that
    /// raced the lookup wins, and the sweep skips that id.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails; oracle failures are
    /// absorbed as [`TaskLiveness::Uncertain`].
    pub fn sweep(&mut self) -> Result<SweepReport, StoreError> {
        let started = Instant::now();
        let keys = self.store.known_keys()?;
        let mut report = SweepReport {
            keys_scanned: keys.len(),
            ..SweepReport::default()
        };

        for key in keys {
            let members = self.store.list_range(&key)?;
            let settled: Vec<String> = members
                .into_iter()
                .filter(|task_id| {
                    let liveness = self.oracle.liveness(task_id);
                    debug!(list_key = %key, task_id = %task_id, ?liveness, "oracle verdict");
                    liveness == TaskLiveness::Settled
                })
                .collect();

            let (tasks_removed, key_removed) = self.evict(&key, &settled)?;
            report.tasks_removed += tasks_removed;
            if key_removed {
                report.keys_removed += 1;
            }
        }

        info!(
            keys_scanned = report.keys_scanned,
            tasks_removed = report.tasks_removed,
            keys_removed = report.keys_removed,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "reconciliation sweep complete"
        );
        Ok(report)
    }

    /// Sweep on a fixed cadence until `shutdown` is set.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub fn run(&mut self, interval: Duration, shutdown: &AtomicBool) {
        info!(interval_secs = interval.as_secs(), "reconciler started");
        while !shutdown.load(Ordering::Relaxed) {
            if let Err(error) = self.sweep() {
                warn!(%error, "sweep failed; retrying on next interval");
            }
            // Sleep in short slices so shutdown is honored promptly.
            let deadline = Instant::now() + interval;
            while Instant::now() < deadline {
                if shutdown.load(Ordering::Relaxed) {
                    info!("reconciler stopping");
                    return;
                }
                std::thread::sleep(Duration::from_millis(100).min(interval));
            }
        }
        info!("reconciler stopping");
    }

    /// Evict `settled` ids from `key`'s list as one transaction. Returns
    /// (tasks removed, whether the key itself was removed).
    fn evict(&mut self, key: &str, settled: &[String]) -> Result<(usize, bool), StoreError> {
        self.store.mutate(|ops| {
            let mut tasks_removed = 0;
            for task_id in settled {
                // Re-check under the transaction: a concurrent terminal event
                // may already have removed this id, or re-filed it elsewhere.
                let Some(task) = ops.pending_task_get(task_id)? else {
                    continue;
                };
                if task.list_key != key {
                    continue;
                }
                ops.list_remove_single(key, task_id)?;
                ops.pending_task_delete(task_id)?;
                tasks_removed += 1;
            }

            let mut key_removed = false;
            if ops.list_len(key)? == 0 {
                key_removed = ops.keys_remove(key)?;
            }

            if tasks_removed > 0 || key_removed {
                ops.counter_set(stats::PENDING_COUNT, ops.pending_count()?)?;
                ops.counter_set(stats::COALESCED_LISTS, ops.keys_count()?)?;
            }
            Ok((tasks_removed, key_removed))
        })
    }
}

impl<O> std::fmt::Debug for Reconciler<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
