use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// "none" | "heuristic" | "openai" | "openrouter" | "compatible"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Required for "compatible"; overrides the default for the others
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_provider() -> String {
    "none".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f64 {
    0.2
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}
