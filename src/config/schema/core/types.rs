use super::super::{MemoryConfig, ObservabilityConfig, SummarizerConfig};
use crate::memory::types::{ChannelInfo, Scope};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Known channels, seeded into the directory at startup. Channels seen
    /// on the transport are added at runtime.
    #[serde(default)]
    pub channels: Vec<ChannelInfo>,
}

impl Config {
    /// Human-readable problems that would make the daemon misbehave. Empty
    /// when the config is usable as is.
    pub fn misconfigurations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.memory.token_budget().is_none() {
            problems.push(format!(
                "memory.token_budget must be positive (got {})",
                self.memory.token_budget
            ));
        }
        if self.memory.retention_months < 0 {
            problems.push(format!(
                "memory.retention_months must not be negative (got {})",
                self.memory.retention_months
            ));
        }
        if self.memory.flush_throttle_seconds == 0 {
            problems.push("memory.flush_throttle_seconds must be at least 1".into());
        }
        if self.memory.summarizer_timeout_secs == 0 {
            problems.push("memory.summarizer_timeout_secs must be at least 1".into());
        }
        if let Err(error) = crate::cron::validate_schedule(&self.memory.compaction_schedule) {
            problems.push(format!("memory.compaction_schedule: {error}"));
        }
        if !(0.0..=2.0).contains(&self.summarizer.temperature) {
            problems.push(format!(
                "summarizer.temperature must be within 0.0..=2.0 (got {})",
                self.summarizer.temperature
            ));
        }
        for channel in &self.channels {
            if !matches!(Scope::parse(&channel.id), Ok(Scope::Channel(_))) {
                problems.push(format!("channels: unusable channel id {:?}", channel.id));
            }
        }

        problems
    }
}
