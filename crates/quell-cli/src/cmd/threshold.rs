//! `quell threshold` — supersession policy administration.

use anyhow::Result;
use clap::Subcommand;
use quell_core::query;
use quell_core::threshold::ThresholdPolicy;
use serde::Serialize;
use tracing::info;

use super::Ctx;
use crate::output::render;

#[derive(Subcommand, Debug)]
pub enum ThresholdCmd {
    /// Set (create or replace) the policy for a key. Both fields are
    /// required: a partial policy can never supersede.
    Set {
        /// Coalesce key the policy applies to.
        key: String,
        /// Maximum tolerated age of the oldest member, in seconds.
        #[arg(long)]
        age: u64,
        /// Maximum tolerated list length.
        #[arg(long)]
        size: u64,
    },
    /// Show the policy for a key.
    Get {
        /// Coalesce key to look up.
        key: String,
    },
    /// Delete the policy for a key, disabling supersession for it.
    Rm {
        /// Coalesce key whose policy to remove.
        key: String,
    },
    /// List all configured policies.
    Ls,
}

#[derive(Debug, Serialize)]
struct ActionResponse {
    action: &'static str,
    key: String,
    success: bool,
}

/// Execute a `quell threshold` subcommand.
pub fn run(ctx: &Ctx, cmd: &ThresholdCmd) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        ThresholdCmd::Set { key, age, size } => {
            let policy = ThresholdPolicy {
                age: *age,
                size: *size,
            };
            store.set_threshold(key, policy)?;
            info!(key = %key, age = policy.age, size = policy.size, "threshold set");
            render(
                ctx.output,
                &ActionResponse {
                    action: "set_threshold",
                    key: key.clone(),
                    success: true,
                },
                |_| format!("{key}: age={age}s size={size}"),
            )
        }
        ThresholdCmd::Get { key } => match query::threshold_for_key(&store, key)? {
            Some(policy) => render(ctx.output, &policy, |policy| {
                format!("{key}: age={}s size={}", policy.age, policy.size)
            }),
            None => render(ctx.output, &serde_json::json!(null), |_| {
                format!("key '{key}' has no threshold configured")
            }),
        },
        ThresholdCmd::Rm { key } => {
            let existed = store.delete_threshold(key)?;
            render(
                ctx.output,
                &ActionResponse {
                    action: "delete_threshold",
                    key: key.clone(),
                    success: existed,
                },
                |response| {
                    if response.success {
                        format!("{key}: threshold removed")
                    } else {
                        format!("key '{key}' had no threshold configured")
                    }
                },
            )
        }
        ThresholdCmd::Ls => {
            let all = query::all_thresholds(&store)?;
            render(ctx.output, &all, |all| {
                all.iter()
                    .map(|(key, policy)| {
                        format!("{key:<32} age={}s size={}", policy.age, policy.size)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}
