use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `channel-memory` - tiered chat channel memory for an agent bot.
#[derive(Parser, Debug)]
#[command(name = "channel-memory")]
#[command(version)]
#[command(
    about = "Tiered channel memory: throttled ingestion, scheduled compaction, budgeted retrieval.",
    long_about = None
)]
pub struct Cli {
    /// Config file (default: ~/.channel-memory/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Ingest JSON-lines messages from stdin and compact on schedule
    Daemon,

    /// Record one message and write it to today's raw memory
    Record {
        /// Channel id the message was posted in
        #[arg(long)]
        channel: String,

        /// Channel display name (updates the channel directory)
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        author: String,

        /// Thread id, for replies inside a thread
        #[arg(long)]
        thread: Option<String>,

        /// Message text
        text: String,
    },

    /// Run the daily compaction now
    Compact {
        /// Compact relative to this date instead of today (UTC, YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Print the memory context an agent invocation in a channel would get
    Context {
        #[arg(long)]
        channel: String,

        /// Read the server-wide memory (default: memory.server_wide)
        #[arg(long)]
        server: bool,

        /// Token budget (default: memory.token_budget)
        #[arg(long)]
        budget: Option<usize>,

        #[arg(long)]
        today: Option<NaiveDate>,

        /// Print the retrieval result as JSON instead of prompt text
        #[arg(long)]
        json: bool,
    },

    /// Apply monthly retention to every scope now
    Prune,

    /// Show token usage and cost of past compaction runs
    Usage,

    /// Report configuration problems
    Check,
}
