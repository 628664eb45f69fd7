use super::compatible::OpenAiCompatibleSummarizer;
use super::heuristic::HeuristicSummarizer;
use super::traits::Summarizer;
use crate::config::SummarizerConfig;
use std::sync::Arc;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Resolve the API key for a provider.
///
/// Resolution order:
/// 1. Explicit `api_key` from config (trimmed, ignored when empty)
/// 2. Provider-specific environment variable (`OPENAI_API_KEY`, `OPENROUTER_API_KEY`)
/// 3. `CHANNEL_MEMORY_API_KEY`
pub fn resolve_api_key(provider: &str, explicit_api_key: Option<&str>) -> Option<String> {
    if let Some(key) = explicit_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    let provider_env: &[&str] = match provider {
        "openai" => &["OPENAI_API_KEY"],
        "openrouter" => &["OPENROUTER_API_KEY"],
        _ => &[],
    };

    provider_env
        .iter()
        .chain(["CHANNEL_MEMORY_API_KEY"].iter())
        .filter_map(|var| std::env::var(var).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Build the configured summarizer. Unknown or incomplete provider settings
/// fall back to the heuristic summarizer with a warning.
pub fn create_summarizer(config: &SummarizerConfig, timeout_secs: u64) -> Arc<dyn Summarizer> {
    let provider = config.provider.trim().to_ascii_lowercase();
    let base_url = match provider.as_str() {
        "" | "none" | "heuristic" => return Arc::new(HeuristicSummarizer),
        "openai" => config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
        "openrouter" => config.base_url.as_deref().unwrap_or(OPENROUTER_BASE_URL),
        "compatible" | "custom" => match config.base_url.as_deref() {
            Some(url) => url,
            None => {
                tracing::warn!(
                    provider = %provider,
                    "summarizer.base_url is required for this provider; falling back to heuristic"
                );
                return Arc::new(HeuristicSummarizer);
            }
        },
        other => {
            tracing::warn!(
                provider = other,
                "unknown summarizer provider; falling back to heuristic"
            );
            return Arc::new(HeuristicSummarizer);
        }
    };

    let api_key = resolve_api_key(&provider, config.api_key.as_deref());
    if api_key.is_none() {
        tracing::warn!(
            provider = %provider,
            "no API key resolved; summaries will degrade to verbatim text"
        );
    }

    Arc::new(OpenAiCompatibleSummarizer::new(
        &provider,
        base_url,
        api_key.as_deref(),
        &config.model,
        config.temperature,
        timeout_secs,
    ))
}
