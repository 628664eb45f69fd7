use crate::memory::types::Tier;
use std::path::PathBuf;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `channel-memory`.
///
/// The tier store reports [`MemoryError`] so callers can tell "bad input"
/// apart from "disk trouble"; orchestration code keeps using
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ChannelMemoryError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Memory tiers ────────────────────────────────────────────────────
    #[error("memory: {0}")]
    Memory(#[from] MemoryError),

    // ── Summarizer provider ─────────────────────────────────────────────
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Memory errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid scope: {0:?}")]
    InvalidScope(String),

    #[error("invalid {tier} identifier: {identifier:?}")]
    InvalidIdentifier { tier: Tier, identifier: String },

    #[error("{tier} artifacts are replace-on-write; append is only supported for raw")]
    AppendUnsupported { tier: Tier },

    #[error("io on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl MemoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ─── Summarizer provider errors ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} authentication failed")]
    Auth { provider: String },

    #[error("provider {provider} returned an empty completion")]
    EmptyResponse { provider: String },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ChannelMemoryError>;
