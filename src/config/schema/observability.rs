use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default filter level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "full" | "compact"
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "full".into()
}
fn default_ansi() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            ansi: default_ansi(),
        }
    }
}
