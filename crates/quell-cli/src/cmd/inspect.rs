//! Read-only inspection commands: `keys`, `list`, `supersedes`, `stats`.

use anyhow::Result;
use quell_core::query;

use super::Ctx;
use crate::output::render;

/// `quell keys` — all known coalesce keys.
pub fn run_keys(ctx: &Ctx) -> Result<()> {
    let store = ctx.open_store()?;
    let keys = query::known_keys(&store)?;
    render(ctx.output, &keys, |keys| keys.join("\n"))
}

/// `quell list <key>` — ordered task ids for a key, newest first.
pub fn run_list(ctx: &Ctx, key: &str) -> Result<()> {
    let store = ctx.open_store()?;
    match query::list_for_key(&store, key)? {
        Some(snapshot) => render(ctx.output, &snapshot, |snap| {
            format!("{}: {}", snap.key, snap.task_ids.join(", "))
        }),
        None => {
            // Unknown key is an explicit not-found, not an error exit.
            render(ctx.output, &serde_json::json!(null), |_| {
                format!("key '{key}' is not known")
            })
        }
    }
}

/// `quell supersedes <key>` — threshold verdict for a key, evaluated now.
pub fn run_supersedes(ctx: &Ctx, key: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let now_us = chrono::Utc::now().timestamp_micros();
    let verdict = query::supersede_verdict(&store, key, now_us)?;
    render(ctx.output, &verdict, |verdict| {
        if verdict.supersedes.is_empty() {
            "nothing superseded".to_string()
        } else {
            verdict.supersedes.join("\n")
        }
    })
}

/// `quell stats` — persisted counters snapshot.
pub fn run_stats(ctx: &Ctx) -> Result<()> {
    let store = ctx.open_store()?;
    let snapshot = query::stats_snapshot(&store)?;
    render(ctx.output, &snapshot, |snapshot| {
        snapshot
            .iter()
            .map(|(name, value)| format!("{name:<22} {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    })
}
