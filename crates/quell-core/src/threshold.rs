//! Per-key supersession policy and the threshold evaluator.
//!
//! A policy fires only when both thresholds are strictly exceeded: the list
//! must be *longer* than `size` and its oldest member *older* than `age`.
//! Equal-to never triggers. Evaluation is read-only and idempotent; pruning
//! happens exclusively through terminal events and reconciliation.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::{KeyStore, StoreError};

/// Supersession gate for one coalesce key.
///
/// Both fields are required: a key with no policy (or, historically, a
/// partial one) never supersedes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdPolicy {
    /// Maximum tolerated age of the oldest list member, in seconds.
    pub age: u64,
    /// Maximum tolerated list length.
    pub size: u64,
}

/// Evaluate the supersession verdict for `list_key` at `now_us`.
///
/// Returns the full list, newest first, when the key's policy is fully
/// configured and both thresholds are strictly exceeded; otherwise an empty
/// vector. Callers interpret a non-empty verdict as "everything here is
/// superseded by the newest member."
///
/// # Errors
///
/// Returns an error if a store read fails.
pub fn supersedes(store: &KeyStore, list_key: &str, now_us: i64) -> Result<Vec<String>, StoreError> {
    let members = store.list_range(list_key)?;
    if members.is_empty() {
        return Ok(Vec::new());
    }

    let Some(policy) = store.threshold(list_key)? else {
        debug!(list_key, "no threshold policy configured");
        return Ok(Vec::new());
    };

    let len = u64::try_from(members.len()).unwrap_or(u64::MAX);
    if len <= policy.size {
        debug!(list_key, len, size = policy.size, "size threshold not exceeded");
        return Ok(Vec::new());
    }

    let Some(oldest) = store.ops().list_oldest(list_key)? else {
        return Ok(Vec::new());
    };
    let Some(task) = store.pending_task(&oldest)? else {
        // List membership without a timestamp breaks the tracking invariant;
        // never fire on a phantom age.
        warn!(list_key, task_id = %oldest, "list member has no tracked timestamp");
        return Ok(Vec::new());
    };

    let max_age_us = i64::try_from(policy.age.saturating_mul(1_000_000)).unwrap_or(i64::MAX);
    let age_us = now_us.saturating_sub(task.inserted_at_us);
    if age_us <= max_age_us {
        debug!(list_key, age_us, max_age_us, "age threshold not exceeded");
        return Ok(Vec::new());
    }

    Ok(members)
}
