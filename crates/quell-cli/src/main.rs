#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use output::OutputMode;
use quell_core::config;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "quell: task-event coalescer tooling",
    long_about = None
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = "quell.toml")]
    config: PathBuf,

    /// Override the store path from config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List all known coalesce keys",
        after_help = "EXAMPLES:\n    quell keys\n    quell keys --json"
    )]
    Keys,

    #[command(
        next_help_heading = "Read",
        about = "Show the ordered task ids for a key (newest first)",
        after_help = "EXAMPLES:\n    quell list builds.linux64"
    )]
    List {
        /// Coalesce key to inspect.
        key: String,
    },

    #[command(
        next_help_heading = "Read",
        about = "Show the supersession verdict for a key",
        long_about = "Evaluate the key's (age, size) threshold policy against its \
                      current list. A non-empty result means every listed id is \
                      superseded by the newest one.",
        after_help = "EXAMPLES:\n    quell supersedes builds.linux64 --json"
    )]
    Supersedes {
        /// Coalesce key to evaluate.
        key: String,
    },

    #[command(
        next_help_heading = "Read",
        about = "Show the persisted service counters",
        after_help = "EXAMPLES:\n    quell stats --json"
    )]
    Stats,

    #[command(
        next_help_heading = "Administer",
        about = "Manage per-key supersession thresholds",
        after_help = "EXAMPLES:\n    quell threshold set builds.linux64 --age 3600 --size 5\n    quell threshold ls"
    )]
    Threshold {
        #[command(subcommand)]
        cmd: cmd::threshold::ThresholdCmd,
    },

    #[command(
        next_help_heading = "Maintain",
        about = "Evict tasks that are no longer pending",
        long_about = "Run a reconciliation sweep: every tracked id is checked against \
                      a status snapshot and evicted when definitively settled. Lookup \
                      failures keep the task (fail open).",
        after_help = "EXAMPLES:\n    quell sweep --status-file statuses.json\n    quell sweep --status-file statuses.json --loop --interval-secs 120"
    )]
    Sweep(cmd::sweep::SweepArgs),

    #[command(
        next_help_heading = "Maintain",
        about = "Feed NDJSON task events through the engine",
        after_help = "EXAMPLES:\n    quell ingest < events.ndjson\n    quell ingest --key-strategy worker --lenient < events.ndjson"
    )]
    Ingest(cmd::ingest::IngestArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;
    let ctx = cmd::Ctx {
        config,
        db_override: cli.db.clone(),
        output: if cli.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        },
    };

    match &cli.command {
        Commands::Keys => cmd::inspect::run_keys(&ctx),
        Commands::List { key } => cmd::inspect::run_list(&ctx, key),
        Commands::Supersedes { key } => cmd::inspect::run_supersedes(&ctx, key),
        Commands::Stats => cmd::inspect::run_stats(&ctx),
        Commands::Threshold { cmd } => cmd::threshold::run(&ctx, cmd),
        Commands::Sweep(args) => cmd::sweep::run(&ctx, args),
        Commands::Ingest(args) => cmd::ingest::run(&ctx, args),
    }
}
