use crate::memory::recorder::ScopeMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "file" | "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Root of the tier layout (`<scope>/<tier>/<identifier>`)
    #[serde(default = "default_memories_dir")]
    pub memories_dir: String,
    /// File every message under the shared `all` scope instead of per channel
    #[serde(default)]
    pub server_wide: bool,
    /// Tokens of memory offered to the agent per invocation
    #[serde(default = "default_token_budget")]
    pub token_budget: i64,
    /// Monthly summaries kept per scope; negative disables retention
    #[serde(default = "default_retention_months")]
    pub retention_months: i64,
    #[serde(default = "default_flush_throttle_seconds")]
    pub flush_throttle_seconds: u64,
    /// Cron expression (UTC) for the daily compaction tick
    #[serde(default = "default_compaction_schedule")]
    pub compaction_schedule: String,
    #[serde(default = "default_summarizer_timeout_secs")]
    pub summarizer_timeout_secs: u64,
    /// SQLite file for compaction usage records; empty disables tracking
    #[serde(default = "default_usage_db")]
    pub usage_db: String,
}

fn default_backend() -> String {
    "file".into()
}
fn default_memories_dir() -> String {
    "~/.channel-memory/memories".into()
}
fn default_token_budget() -> i64 {
    8000
}
fn default_retention_months() -> i64 {
    12
}
fn default_flush_throttle_seconds() -> u64 {
    30
}
fn default_compaction_schedule() -> String {
    "0 5 0 * * *".into()
}
fn default_summarizer_timeout_secs() -> u64 {
    45
}
fn default_usage_db() -> String {
    "~/.channel-memory/usage.db".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            memories_dir: default_memories_dir(),
            server_wide: false,
            token_budget: default_token_budget(),
            retention_months: default_retention_months(),
            flush_throttle_seconds: default_flush_throttle_seconds(),
            compaction_schedule: default_compaction_schedule(),
            summarizer_timeout_secs: default_summarizer_timeout_secs(),
            usage_db: default_usage_db(),
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).into_owned())
}

impl MemoryConfig {
    pub fn memories_path(&self) -> PathBuf {
        expand_path(&self.memories_dir)
    }

    pub fn usage_db_path(&self) -> Option<PathBuf> {
        (!self.usage_db.trim().is_empty()).then(|| expand_path(&self.usage_db))
    }

    /// The configured budget, or `None` when it is zero or negative.
    pub fn token_budget(&self) -> Option<usize> {
        usize::try_from(self.token_budget).ok().filter(|b| *b > 0)
    }

    pub fn flush_throttle(&self) -> Duration {
        Duration::from_secs(self.flush_throttle_seconds)
    }

    pub fn summarizer_timeout(&self) -> Duration {
        Duration::from_secs(self.summarizer_timeout_secs)
    }

    pub fn scope_mode(&self) -> ScopeMode {
        ScopeMode::from_server_wide(self.server_wide)
    }
}
