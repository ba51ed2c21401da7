//! Deployment configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file
//! yields a usable development setup. Thresholds listed in config are a
//! seed: they apply only to keys with no stored policy, so operator writes
//! through the admin surface always win.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::store::{DEFAULT_NAMESPACE, KeyStore};
use crate::threshold::ThresholdPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuellConfig {
    /// Namespace prefix scoping all persisted keys and the routing labels
    /// this deployment listens for.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Seed threshold policies, keyed by coalesce key.
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdPolicy>,
}

impl Default for QuellConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            store: StoreConfig::default(),
            reconcile: ReconcileConfig::default(),
            thresholds: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between reconciliation sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    /// Per-lookup timeout the status-oracle client must apply, in seconds.
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("quell.db")
}

const fn default_sweep_interval_secs() -> u64 {
    300
}

const fn default_oracle_timeout_secs() -> u64 {
    3
}

/// Load configuration from `path`; a missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<QuellConfig> {
    if !path.exists() {
        return Ok(QuellConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse config file {}", path.display()))
}

/// Write config-declared thresholds into the store, without overwriting
/// policies an operator has already set or changed.
///
/// # Errors
///
/// Returns an error if a store operation fails.
pub fn seed_thresholds(store: &KeyStore, config: &QuellConfig) -> Result<()> {
    for (key, policy) in &config.thresholds {
        if store.threshold(key)?.is_none() {
            info!(key = %key, age = policy.age, size = policy.size, "seeding threshold from config");
            store.set_threshold(key, *policy)?;
        }
    }
    Ok(())
}
