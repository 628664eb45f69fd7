use super::expression::next_run_for;
use crate::channels::ChannelDirectory;
use crate::memory::compaction::{CompactionEngine, CompactionReport};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

/// Fires the daily compaction on a cron schedule until cancelled.
pub struct CompactionScheduler {
    engine: Arc<CompactionEngine>,
    directory: Arc<ChannelDirectory>,
    expression: String,
}

impl CompactionScheduler {
    pub fn new(
        engine: Arc<CompactionEngine>,
        directory: Arc<ChannelDirectory>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            directory,
            expression: expression.into(),
        }
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        loop {
            let now = Utc::now();
            let next = next_run_for(&self.expression, now)?;
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next = %next, "next compaction scheduled");

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("compaction scheduler stopped");
                    return Ok(());
                }
                () = time::sleep(wait) => {}
            }

            let report = self.tick(next).await;
            if !report.success() {
                tracing::warn!(
                    run_id = %report.run_id,
                    degraded = report.degraded(),
                    failed = report.failed(),
                    "scheduled compaction finished with problems"
                );
            }
        }
    }

    /// One scheduled run, dated by the tick that fired it.
    pub async fn tick(&self, at: DateTime<Utc>) -> CompactionReport {
        let channels = self.directory.channels();
        self.engine
            .run_daily_compaction(&channels, at.date_naive())
            .await
    }
}
