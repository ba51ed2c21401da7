//! `quell ingest` — feed decoded task events through the engine.
//!
//! Reads newline-delimited JSON events on stdin, one [`TaskEvent`] per
//! line, and dispatches each through the coalescing engine. This is the
//! same call boundary the bus consumer uses in production, which makes it
//! the tool for backfills and local testing.

use std::io::BufRead;

use anyhow::{Context, Result, bail};
use clap::Args;
use quell_core::engine::{CoalescingEngine, Disposition};
use quell_core::event::TaskEvent;
use quell_core::key::{DeriveKey, ProvisionerWorkerType, RouteSuffix};
use serde::Serialize;
use tracing::warn;

use super::Ctx;
use crate::output::render;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Key derivation strategy: `route` (routing-label suffix under the
    /// configured prefix) or `worker` (provisionerId.workerType).
    #[arg(long, default_value = "route")]
    pub key_strategy: String,

    /// Log and skip malformed lines instead of stopping at the first one.
    /// A malformed event is a protocol mismatch either way.
    #[arg(long)]
    pub lenient: bool,
}

/// Tally of what one ingest run did.
#[derive(Debug, Default, Serialize)]
pub struct IngestSummary {
    pub lines: usize,
    pub inserted: usize,
    pub removed: usize,
    pub reran: usize,
    pub unknown: usize,
    pub observed: usize,
    pub skipped_reruns: usize,
    pub no_coalesce_key: usize,
    pub malformed: usize,
}

impl IngestSummary {
    fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Inserted { .. } => self.inserted += 1,
            Disposition::Removed { .. } => self.removed += 1,
            Disposition::Rerun => self.reran += 1,
            Disposition::Unknown => self.unknown += 1,
            Disposition::Observed => self.observed += 1,
            Disposition::SkippedRerun => self.skipped_reruns += 1,
            Disposition::NoCoalesceKey => self.no_coalesce_key += 1,
        }
    }
}

fn strategy(name: &str, prefix: &str) -> Result<Box<dyn DeriveKey + Send>> {
    match name {
        "route" => Ok(Box::new(RouteSuffix::new(prefix))),
        "worker" => Ok(Box::new(ProvisionerWorkerType)),
        other => bail!("unknown key strategy '{other}': expected 'route' or 'worker'"),
    }
}

/// Execute `quell ingest`, reading events from `input`.
pub fn run_from(ctx: &Ctx, args: &IngestArgs, input: impl BufRead) -> Result<()> {
    let mut store = ctx.open_store()?;
    quell_core::stats::seed(&mut store).context("seed stats counters")?;
    quell_core::config::seed_thresholds(&store, &ctx.config)?;
    let derive = strategy(&args.key_strategy, &ctx.config.prefix)?;
    let mut engine = CoalescingEngine::new(store, derive);
    let mut summary = IngestSummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line.context("read event line")?;
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;

        let event: TaskEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(error) => {
                summary.malformed += 1;
                if args.lenient {
                    warn!(line = index + 1, %error, "skipping malformed event");
                    continue;
                }
                bail!("malformed event on line {}: {error}", index + 1);
            }
        };

        let disposition = engine
            .handle(&event)
            .with_context(|| format!("apply event for task {}", event.task_id))?;
        summary.record(&disposition);
    }

    render(ctx.output, &summary, |summary| {
        format!(
            "{} events: {} inserted, {} removed, {} reran, {} unknown, \
             {} observed, {} retry runs skipped, {} without key, {} malformed",
            summary.lines,
            summary.inserted,
            summary.removed,
            summary.reran,
            summary.unknown,
            summary.observed,
            summary.skipped_reruns,
            summary.no_coalesce_key,
            summary.malformed
        )
    })
}

/// Execute `quell ingest` over stdin.
pub fn run(ctx: &Ctx, args: &IngestArgs) -> Result<()> {
    run_from(ctx, args, std::io::stdin().lock())
}
