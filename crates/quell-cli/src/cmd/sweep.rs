//! `quell sweep` — run the stale reconciler against a status snapshot.
//!
//! The production deployment implements [`StatusOracle`] over the queue's
//! HTTP status endpoint with a bounded timeout. For operational scrubs and
//! replays this command reads the same answers from a JSON file mapping
//! task id to state: `{"abc123": "pending", "def456": "completed"}`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use quell_core::reconcile::{Reconciler, StatusOracle, TaskLiveness};

use super::Ctx;
use crate::output::render;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// JSON file of task-id -> state answers standing in for the status
    /// service.
    #[arg(long)]
    pub status_file: PathBuf,

    /// Keep sweeping on the configured interval instead of exiting after
    /// one pass.
    #[arg(long = "loop")]
    pub run_loop: bool,

    /// Override the sweep interval from config, in seconds.
    #[arg(long)]
    pub interval_secs: Option<u64>,
}

/// Oracle answering from a fixed id -> state table.
///
/// Ids absent from the table are settled: the queue does not know them,
/// the same answer a 404 from the status endpoint gives.
struct FileOracle {
    states: HashMap<String, String>,
}

impl FileOracle {
    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read status file {}", path.display()))?;
        let states = serde_json::from_str(&raw)
            .with_context(|| format!("parse status file {}", path.display()))?;
        Ok(Self { states })
    }
}

impl StatusOracle for FileOracle {
    fn liveness(&self, task_id: &str) -> TaskLiveness {
        match self.states.get(task_id).map(String::as_str) {
            Some("pending") => TaskLiveness::Pending,
            Some("uncertain") => TaskLiveness::Uncertain,
            _ => TaskLiveness::Settled,
        }
    }
}

/// Execute `quell sweep`.
pub fn run(ctx: &Ctx, args: &SweepArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let oracle = FileOracle::load(&args.status_file)?;
    let mut reconciler = Reconciler::new(store, oracle);

    if args.run_loop {
        let interval = Duration::from_secs(
            args.interval_secs
                .unwrap_or(ctx.config.reconcile.interval_secs),
        );
        // Runs until the process is terminated.
        let shutdown = AtomicBool::new(false);
        reconciler.run(interval, &shutdown);
        return Ok(());
    }

    let report = reconciler.sweep()?;
    render(ctx.output, &report, |report| {
        format!(
            "scanned {} keys, removed {} tasks and {} empty keys",
            report.keys_scanned, report.tasks_removed, report.keys_removed
        )
    })
}
