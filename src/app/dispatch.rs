use super::daemon::run_daemon;
use super::runtime::MemoryRuntime;
use crate::channels::StdinTransport;
use crate::cli::Commands;
use crate::config::Config;
use crate::error::ConfigError;
use crate::memory::compaction::{CompactionReport, PeriodStatus};
use crate::memory::{render_channel_context, render_server_context};
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;

/// Load the config file (the default location when `path` is `None`) and
/// apply environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_init()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    if command == Commands::Check {
        return check(&config);
    }

    let runtime = MemoryRuntime::from_config(config).await;
    match command {
        Commands::Daemon => run_daemon(runtime, Arc::new(StdinTransport)).await,
        Commands::Record {
            channel,
            name,
            author,
            thread,
            text,
        } => {
            let persisted =
                record(&runtime, &channel, name.as_deref(), &author, thread.as_deref(), &text)
                    .await?;
            println!("Recorded message for channel {channel} ({persisted} entries written)");
            Ok(())
        }
        Commands::Compact { today } => {
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let channels = runtime.discover_channels().await;
            let report = runtime.engine.run_daily_compaction(&channels, today).await;
            print!("{}", format_report(&report));
            Ok(())
        }
        Commands::Context {
            channel,
            server,
            budget,
            today,
            json,
        } => {
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let output = context(&runtime, &channel, server, budget, today, json).await?;
            print!("{output}");
            Ok(())
        }
        Commands::Prune => {
            let channels = runtime.discover_channels().await;
            let reports = runtime.engine.run_retention(&channels).await;
            if reports.is_empty() {
                println!("Nothing to prune");
            }
            for (scope, report) in reports {
                println!(
                    "{scope}: kept {}, deleted {}, failed {}",
                    report.kept.len(),
                    report.deleted.len(),
                    report.failed.len()
                );
            }
            Ok(())
        }
        Commands::Usage => {
            let summary = runtime.usage.summary().await?;
            println!(
                "Compaction runs: {} ({} with problems)",
                summary.run_count, summary.failed_run_count
            );
            println!("Input tokens:    {}", summary.total_input_tokens);
            println!("Output tokens:   {}", summary.total_output_tokens);
            #[allow(clippy::cast_precision_loss)]
            let dollars = summary.total_estimated_cost_micros as f64 / 1_000_000.0;
            println!("Estimated cost:  ${dollars:.4}");
            Ok(())
        }
        Commands::Check => check(&runtime.config),
    }
}

fn check(config: &Config) -> Result<()> {
    let problems = config.misconfigurations();
    if problems.is_empty() {
        println!("Config OK ({})", config.config_path.display());
        return Ok(());
    }
    for problem in &problems {
        println!("  ✗ {problem}");
    }
    bail!("{} configuration problem(s)", problems.len())
}

/// Record one message and persist it right away. Returns how many entries
/// were written.
async fn record(
    runtime: &MemoryRuntime,
    channel: &str,
    name: Option<&str>,
    author: &str,
    thread: Option<&str>,
    text: &str,
) -> Result<usize> {
    if let Some(name) = name {
        runtime.directory.register(channel, name);
    }
    if !runtime
        .recorder
        .record_at(channel, thread, author, text, Utc::now())
    {
        bail!("message was not recorded (empty text or unusable channel id {channel:?})");
    }
    runtime
        .buffer
        .flush_all()
        .await
        .context("Failed to write the message to raw memory")
}

async fn context(
    runtime: &MemoryRuntime,
    channel: &str,
    server: bool,
    budget: Option<usize>,
    today: NaiveDate,
    json: bool,
) -> Result<String> {
    let budget = match budget {
        Some(0) => {
            return Err(ConfigError::Validation("--budget must be positive (got 0)".into()).into());
        }
        Some(budget) => budget,
        None => runtime.config.memory.token_budget().ok_or_else(|| {
            ConfigError::Validation(format!(
                "memory.token_budget must be positive (got {})",
                runtime.config.memory.token_budget
            ))
        })?,
    };

    let server = server || runtime.config.memory.server_wide;
    let result = if server {
        let channels = runtime.discover_channels().await;
        runtime
            .retriever
            .load_memories_for_server_at(channel, &channels, budget, today)
            .await
    } else {
        runtime
            .retriever
            .load_memories_for_channel_at(channel, budget, today)
            .await
    };
    tracing::info!(
        items = result.memories.len(),
        total_tokens = result.total_tokens,
        budget_used = result.budget_used,
        "memory context loaded"
    );

    if json {
        let mut out = serde_json::to_string_pretty(&result)?;
        out.push('\n');
        return Ok(out);
    }
    if server {
        Ok(render_server_context(&result, &runtime.directory.name_for(channel)))
    } else {
        Ok(render_channel_context(&result))
    }
}

fn format_report(report: &CompactionReport) -> String {
    let mut out = format!("Compaction run {} for {}\n", report.run_id, report.today);
    if report.periods.is_empty() {
        out.push_str("  nothing due\n");
    }
    for period in &report.periods {
        let status = match &period.status {
            PeriodStatus::Summarized => "summarized".to_string(),
            PeriodStatus::Degraded => "degraded (verbatim fallback)".to_string(),
            PeriodStatus::Failed(reason) => format!("failed: {reason}"),
        };
        out.push_str(&format!(
            "  {} {} {}: {} in, {} tokens out, {status}\n",
            period.scope, period.tier, period.identifier, period.entries_in, period.tokens_out
        ));
    }
    for (scope, retention) in &report.retention {
        out.push_str(&format!(
            "  {scope} retention: kept {}, deleted {}\n",
            retention.kept.len(),
            retention.deleted.len()
        ));
    }
    out.push_str(if report.success() { "  ok\n" } else { "  finished with problems\n" });
    out
}
