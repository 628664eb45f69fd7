use super::types::{CompactionUsageRecord, UsageSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// Receives one record per compaction run.
#[async_trait]
pub trait UsageTracker: Send + Sync {
    async fn record(&self, record: &CompactionUsageRecord) -> Result<()>;

    async fn summary(&self) -> Result<UsageSummary>;
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageTracker;

#[async_trait]
impl UsageTracker for NoopUsageTracker {
    async fn record(&self, _record: &CompactionUsageRecord) -> Result<()> {
        Ok(())
    }

    async fn summary(&self) -> Result<UsageSummary> {
        Ok(UsageSummary::default())
    }
}

pub struct SqliteUsageTracker {
    pool: SqlitePool,
}

impl SqliteUsageTracker {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| {
                    format!("Failed to create usage directory: {}", parent.display())
                })?;
        }

        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .with_context(|| format!("Failed to open usage DB: {}", db_path.display()))?;
        Self::new(pool).await
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS compaction_runs (
            id                    TEXT PRIMARY KEY,
            run_date              TEXT NOT NULL,
            provider              TEXT NOT NULL,
            model                 TEXT NOT NULL,
            periods_total         INTEGER NOT NULL,
            periods_degraded      INTEGER NOT NULL,
            periods_failed        INTEGER NOT NULL,
            input_tokens          INTEGER NOT NULL,
            output_tokens         INTEGER NOT NULL,
            estimated_cost_micros INTEGER,
            success               INTEGER NOT NULL,
            created_at            TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create compaction_runs table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_compaction_runs_date ON compaction_runs(run_date)")
        .execute(pool)
        .await
        .context("Failed to create compaction_runs index")?;

    Ok(())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[async_trait]
impl UsageTracker for SqliteUsageTracker {
    async fn record(&self, record: &CompactionUsageRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO compaction_runs (
                id, run_date, provider, model, periods_total, periods_degraded,
                periods_failed, input_tokens, output_tokens, estimated_cost_micros,
                success, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.run_date)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(to_i64(record.periods_total))
        .bind(to_i64(record.periods_degraded))
        .bind(to_i64(record.periods_failed))
        .bind(to_i64(record.input_tokens))
        .bind(to_i64(record.output_tokens))
        .bind(record.estimated_cost_micros)
        .bind(record.success)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert compaction run")?;
        Ok(())
    }

    async fn summary(&self) -> Result<UsageSummary> {
        let row = sqlx::query(
            "SELECT
                COALESCE(SUM(input_tokens), 0),
                COALESCE(SUM(output_tokens), 0),
                COALESCE(SUM(estimated_cost_micros), 0),
                COUNT(*),
                COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0)
             FROM compaction_runs",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to summarize compaction runs")?;

        Ok(UsageSummary {
            total_input_tokens: to_u64(row.get(0)),
            total_output_tokens: to_u64(row.get(1)),
            total_estimated_cost_micros: row.get(2),
            run_count: to_u64(row.get(3)),
            failed_run_count: to_u64(row.get(4)),
        })
    }
}
