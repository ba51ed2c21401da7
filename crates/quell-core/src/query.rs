//! Read-only snapshot surface.
//!
//! These are the payloads the deployment's HTTP layer (and the CLI) serve.
//! Nothing in this module mutates the store. An unknown key is reported as
//! `None`/not-found where the distinction matters, and as an empty verdict
//! where it does not, matching the consumer-facing contract.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::stats;
use crate::store::{KeyStore, StoreError};
use crate::threshold::{self, ThresholdPolicy};

/// One coalesce list: its key and ordered members, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListSnapshot {
    pub key: String,
    pub task_ids: Vec<String>,
}

/// Supersession verdict for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupersedeVerdict {
    /// Every id here is superseded by the newest member; empty when the
    /// key's thresholds are not (yet) exceeded or no policy is configured.
    pub supersedes: Vec<String>,
}

/// All known coalesce keys, sorted.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn known_keys(store: &KeyStore) -> Result<Vec<String>, StoreError> {
    store.known_keys()
}

/// The list for `key`, or `None` if the key is not currently known.
///
/// `None` distinguishes "key never existed (or has emptied)" from a known
/// key whose verdict happens to be empty.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn list_for_key(store: &KeyStore, key: &str) -> Result<Option<ListSnapshot>, StoreError> {
    if !store.is_known_key(key)? {
        return Ok(None);
    }
    Ok(Some(ListSnapshot {
        key: key.to_string(),
        task_ids: store.list_range(key)?,
    }))
}

/// Threshold verdict for `key` at `now_us`. Unknown keys yield an empty
/// verdict, not an error.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn supersede_verdict(
    store: &KeyStore,
    key: &str,
    now_us: i64,
) -> Result<SupersedeVerdict, StoreError> {
    Ok(SupersedeVerdict {
        supersedes: threshold::supersedes(store, key, now_us)?,
    })
}

/// Snapshot of all persisted counters.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn stats_snapshot(store: &KeyStore) -> Result<BTreeMap<String, i64>, StoreError> {
    stats::snapshot(store)
}

/// Threshold policy for `key`, if configured.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn threshold_for_key(
    store: &KeyStore,
    key: &str,
) -> Result<Option<ThresholdPolicy>, StoreError> {
    store.threshold(key)
}

/// All configured threshold policies.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn all_thresholds(store: &KeyStore) -> Result<BTreeMap<String, ThresholdPolicy>, StoreError> {
    store.thresholds()
}
