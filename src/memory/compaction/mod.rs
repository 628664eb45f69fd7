//! Daily compaction: raw → daily, and on week/month boundaries daily →
//! weekly → monthly, followed by monthly retention.

mod engine;
pub mod prompts;
mod retention;

pub use engine::{CompactionEngine, CompactionSettings};
pub use retention::{RetentionReport, enforce_retention};

use super::types::{Scope, Tier};
use chrono::NaiveDate;

/// How one period ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodStatus {
    Summarized,
    /// Written, but at least one section holds the verbatim source because
    /// the summarizer failed, timed out or returned nothing.
    Degraded,
    /// Nothing was written; the period is retried on the next run while its
    /// source still exists.
    Failed(String),
}

/// Metrics for one compacted `(tier, scope, identifier)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodOutcome {
    pub tier: Tier,
    pub scope: Scope,
    pub identifier: String,
    pub status: PeriodStatus,
    /// Raw entries (daily) or source artifacts (weekly, monthly) read.
    pub entries_in: usize,
    pub chars_out: usize,
    pub tokens_out: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl PeriodOutcome {
    fn failed(tier: Tier, scope: &Scope, identifier: &str, reason: impl Into<String>) -> Self {
        Self {
            tier,
            scope: scope.clone(),
            identifier: identifier.to_string(),
            status: PeriodStatus::Failed(reason.into()),
            entries_in: 0,
            chars_out: 0,
            tokens_out: 0,
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// Everything one compaction run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionReport {
    pub run_id: String,
    pub today: NaiveDate,
    pub periods: Vec<PeriodOutcome>,
    pub retention: Vec<(Scope, RetentionReport)>,
}

impl CompactionReport {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            today,
            periods: Vec::new(),
            retention: Vec::new(),
        }
    }

    fn count(&self, status: fn(&PeriodStatus) -> bool) -> usize {
        self.periods.iter().filter(|p| status(&p.status)).count()
    }

    pub fn degraded(&self) -> usize {
        self.count(|s| matches!(s, PeriodStatus::Degraded))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, PeriodStatus::Failed(_)))
    }

    /// True when every period was summarized and every retention delete
    /// went through.
    pub fn success(&self) -> bool {
        self.periods
            .iter()
            .all(|p| p.status == PeriodStatus::Summarized)
            && self.retention.iter().all(|(_, r)| r.failed.is_empty())
    }

    pub fn input_tokens(&self) -> u64 {
        self.periods.iter().map(|p| p.input_tokens).sum()
    }

    pub fn output_tokens(&self) -> u64 {
        self.periods.iter().map(|p| p.output_tokens).sum()
    }

    pub fn find(&self, tier: Tier, scope: &Scope, identifier: &str) -> Option<&PeriodOutcome> {
        self.periods
            .iter()
            .find(|p| p.tier == tier && &p.scope == scope && p.identifier == identifier)
    }
}
