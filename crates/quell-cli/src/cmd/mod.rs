//! CLI command implementations.

pub mod ingest;
pub mod inspect;
pub mod sweep;
pub mod threshold;

use std::path::PathBuf;

use anyhow::{Context, Result};
use quell_core::config::QuellConfig;
use quell_core::store::KeyStore;

use crate::output::OutputMode;

/// Shared command context resolved from flags and config.
pub struct Ctx {
    pub config: QuellConfig,
    pub db_override: Option<PathBuf>,
    pub output: OutputMode,
}

impl Ctx {
    /// Open the key store this deployment points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub fn open_store(&self) -> Result<KeyStore> {
        let path = self
            .db_override
            .as_deref()
            .unwrap_or(&self.config.store.path);
        KeyStore::open(path, self.config.prefix.clone())
            .with_context(|| format!("open key store {}", path.display()))
    }
}
