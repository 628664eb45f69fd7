use crate::config::ObservabilityConfig;
use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse a log level name; `None` when it is not one.
pub fn parse_level(raw: &str) -> Option<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global fmt subscriber. Logs go to stderr so command output
/// on stdout stays clean.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr);

    match config.log_format.as_str() {
        "compact" => tracing::subscriber::set_global_default(builder.compact().finish()),
        _ => tracing::subscriber::set_global_default(builder.finish()),
    }
    .context("setting default subscriber failed")?;

    if parse_level(&config.log_level).is_none() {
        tracing::warn!(
            "Unknown log level '{}', falling back to info",
            config.log_level
        );
    }
    if !matches!(config.log_format.as_str(), "full" | "compact") {
        tracing::warn!(
            "Unknown log format '{}', falling back to full",
            config.log_format
        );
    }
    Ok(())
}
