use super::prompts::{
    DAILY_INSTRUCTION, MONTHLY_INSTRUCTION, WEEKLY_INSTRUCTION, raw_source, sectioned_source,
};
use super::retention::{RetentionReport, enforce_retention};
use super::{CompactionReport, PeriodOutcome, PeriodStatus};
use crate::llm::Summarizer;
use crate::memory::buffer::IngestionBuffer;
use crate::memory::period::{
    date_id, month_id, parse_date_id, previous_month_start, previous_week_id, week_dates,
    week_overlaps_month, yesterday,
};
use crate::memory::recorder::ScopeMode;
use crate::memory::sections::{Section, parse_sections, render_sections};
use crate::memory::store::TierStore;
use crate::memory::tokens::estimate_tokens;
use crate::memory::types::{ChannelInfo, RawEntry, Scope, Tier, decode_jsonl};
use crate::usage::{
    CompactionUsageRecord, ModelPricing, NoopUsageTracker, UsageTracker, default_pricing,
    lookup_pricing,
};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CompactionSettings {
    pub mode: ScopeMode,
    /// Monthly artifacts kept per scope. Negative values skip retention.
    pub retention_months: i64,
    pub summarizer_timeout: Duration,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            mode: ScopeMode::PerChannel,
            retention_months: 12,
            summarizer_timeout: Duration::from_secs(45),
        }
    }
}

/// Output of one summarizer call, or the verbatim source when it failed.
struct SectionSummary {
    text: String,
    degraded: bool,
    input_tokens: u64,
    output_tokens: u64,
}

pub struct CompactionEngine {
    store: Arc<dyn TierStore>,
    summarizer: Arc<dyn Summarizer>,
    buffer: Option<IngestionBuffer>,
    usage: Arc<dyn UsageTracker>,
    pricing: Vec<ModelPricing>,
    settings: CompactionSettings,
}

impl CompactionEngine {
    pub fn new(
        store: Arc<dyn TierStore>,
        summarizer: Arc<dyn Summarizer>,
        settings: CompactionSettings,
    ) -> Self {
        Self {
            store,
            summarizer,
            buffer: None,
            usage: Arc::new(NoopUsageTracker),
            pricing: default_pricing(),
            settings,
        }
    }

    /// Flush this buffer before reading raw memory, and drop consumed
    /// server-wide days from it afterwards.
    #[must_use]
    pub fn with_buffer(mut self, buffer: IngestionBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    #[must_use]
    pub fn with_usage_tracker(mut self, usage: Arc<dyn UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn settings(&self) -> &CompactionSettings {
        &self.settings
    }

    /// Compact everything due relative to `today`.
    ///
    /// Each scope and period is isolated: a failure is recorded in the
    /// report and logged, and the run moves on.
    pub async fn run_daily_compaction(
        &self,
        channels: &[ChannelInfo],
        today: NaiveDate,
    ) -> CompactionReport {
        let mut report = CompactionReport::new(today);

        if let Some(buffer) = &self.buffer
            && let Err(error) = buffer.flush_all().await
        {
            tracing::warn!(
                error = %error,
                "buffer flush before compaction failed; compacting what is on disk"
            );
        }

        for scope in self.scopes_for(channels) {
            self.compact_scope(&scope, today, &mut report).await;
        }

        self.record_usage(&report).await;
        tracing::info!(
            run_id = %report.run_id,
            today = %date_id(today),
            periods = report.periods.len(),
            degraded = report.degraded(),
            failed = report.failed(),
            input_tokens = report.input_tokens(),
            output_tokens = report.output_tokens(),
            success = report.success(),
            "compaction run finished"
        );
        report
    }

    /// Apply monthly retention to every scope now, outside the monthly cadence.
    pub async fn run_retention(&self, channels: &[ChannelInfo]) -> Vec<(Scope, RetentionReport)> {
        let mut reports = Vec::new();
        for scope in self.scopes_for(channels) {
            if let Some(report) =
                enforce_retention(self.store.as_ref(), &scope, self.settings.retention_months).await
            {
                reports.push((scope, report));
            }
        }
        reports
    }

    fn scopes_for(&self, channels: &[ChannelInfo]) -> Vec<Scope> {
        if self.settings.mode == ScopeMode::ServerWide {
            return vec![Scope::Server];
        }
        let mut scopes: Vec<Scope> = channels
            .iter()
            .filter_map(|channel| match Scope::parse(&channel.id) {
                Ok(scope @ Scope::Channel(_)) => Some(scope),
                Ok(Scope::Server) | Err(_) => {
                    tracing::warn!(channel_id = %channel.id, "skipping channel with unusable id");
                    None
                }
            })
            .collect();
        scopes.sort();
        scopes.dedup();
        scopes
    }

    async fn compact_scope(&self, scope: &Scope, today: NaiveDate, report: &mut CompactionReport) {
        for date in self.days_due(scope, today).await {
            if let Some(outcome) = self.compact_day(scope, date).await {
                report.periods.push(outcome);
            }
        }

        if today.weekday() == Weekday::Mon
            && let Some(outcome) = self.compact_week(scope, &previous_week_id(today)).await
        {
            report.periods.push(outcome);
        }

        if today.day() == 1 {
            if let Some(outcome) = self.compact_month(scope, previous_month_start(today)).await {
                report.periods.push(outcome);
            }
            if let Some(retention) =
                enforce_retention(self.store.as_ref(), scope, self.settings.retention_months).await
            {
                report.retention.push((scope.clone(), retention));
            }
        }
    }

    /// Yesterday, plus any older raw day that never got a daily artifact.
    async fn days_due(&self, scope: &Scope, today: NaiveDate) -> Vec<NaiveDate> {
        let yesterday = yesterday(today);
        let mut due = vec![yesterday];

        let raw_days = match self.store.list(Tier::Raw, scope).await {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!(
                    scope = %scope,
                    error = %error,
                    "failed to list raw memory; compacting yesterday only"
                );
                return due;
            }
        };
        for date in raw_days.iter().filter_map(|id| parse_date_id(id)) {
            if date >= yesterday {
                continue;
            }
            match self.store.get(Tier::Daily, scope, &date_id(date)).await {
                Ok(Some(_)) => {}
                Ok(None) => due.push(date),
                Err(error) => {
                    tracing::warn!(
                        scope = %scope,
                        date = %date_id(date),
                        error = %error,
                        "failed to check daily memory"
                    );
                }
            }
        }
        due.sort();
        due
    }

    async fn compact_day(&self, scope: &Scope, date: NaiveDate) -> Option<PeriodOutcome> {
        let identifier = date_id(date);
        // A daily built from a partial raw day would never be rebuilt.
        if let Some(buffer) = &self.buffer {
            let unwritten = buffer.unpersisted_on(scope, date);
            if unwritten > 0 {
                tracing::warn!(
                    scope = %scope,
                    identifier = %identifier,
                    unwritten,
                    "raw memory not fully written; leaving the day for the next run"
                );
                return Some(PeriodOutcome::failed(
                    Tier::Daily,
                    scope,
                    &identifier,
                    format!("{unwritten} raw entries not yet written"),
                ));
            }
        }
        let raw = match self.store.get(Tier::Raw, scope, &identifier).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(
                    scope = %scope,
                    identifier = %identifier,
                    error = %error,
                    "failed to read raw memory"
                );
                return Some(PeriodOutcome::failed(
                    Tier::Daily,
                    scope,
                    &identifier,
                    error.to_string(),
                ));
            }
        };

        let mut entries = decode_jsonl(&raw);
        if entries.is_empty() {
            tracing::debug!(
                scope = %scope,
                identifier = %identifier,
                "raw memory has no entries; skipping"
            );
            return None;
        }
        entries.sort_by_key(|entry| entry.timestamp);

        let groups: Vec<(Option<String>, String)> = if scope.is_server() {
            let mut by_channel: BTreeMap<&str, Vec<&RawEntry>> = BTreeMap::new();
            for entry in &entries {
                by_channel.entry(entry.channel_name.as_str()).or_default().push(entry);
            }
            by_channel
                .into_iter()
                .map(|(name, group)| (Some(name.to_string()), raw_source(&group)))
                .collect()
        } else {
            let all: Vec<&RawEntry> = entries.iter().collect();
            vec![(None, raw_source(&all))]
        };

        let outcome = self
            .summarize_and_store(
                Tier::Daily,
                scope,
                &identifier,
                entries.len(),
                groups,
                DAILY_INSTRUCTION,
            )
            .await;

        // Write summary, then clear raw: never the reverse.
        if scope.is_server() && !matches!(outcome.status, PeriodStatus::Failed(_)) {
            self.consume_raw(scope, date, &identifier).await;
        }
        Some(outcome)
    }

    /// Raw server-wide memory is not kept once its daily artifact exists.
    /// The buffer only lets go of entries that were on disk.
    async fn consume_raw(&self, scope: &Scope, date: NaiveDate, identifier: &str) {
        if let Some(buffer) = &self.buffer {
            buffer.clear(scope, date).await;
        }
        match self.store.delete(Tier::Raw, scope, identifier).await {
            Ok(_) => tracing::debug!(scope = %scope, identifier, "consumed raw memory"),
            Err(error) => {
                tracing::warn!(
                    scope = %scope,
                    identifier,
                    error = %error,
                    "failed to delete consumed raw memory"
                );
            }
        }
    }

    async fn compact_week(&self, scope: &Scope, week: &str) -> Option<PeriodOutcome> {
        let mut sources = Vec::new();
        for date in week_dates(week) {
            let identifier = date_id(date);
            match self.store.get(Tier::Daily, scope, &identifier).await {
                Ok(Some(content)) => sources.push((identifier, content)),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        scope = %scope,
                        week,
                        error = %error,
                        "failed to read daily memory for week"
                    );
                    return Some(PeriodOutcome::failed(
                        Tier::Weekly,
                        scope,
                        week,
                        error.to_string(),
                    ));
                }
            }
        }
        if sources.is_empty() {
            return None;
        }
        let entries_in = sources.len();
        let groups = group_sections("", &sources);
        Some(
            self.summarize_and_store(
                Tier::Weekly,
                scope,
                week,
                entries_in,
                groups,
                WEEKLY_INSTRUCTION,
            )
            .await,
        )
    }

    async fn compact_month(&self, scope: &Scope, month_start: NaiveDate) -> Option<PeriodOutcome> {
        let month = month_id(month_start);
        let year_prefix = format!("{}-", month_start.year());

        let mut weeks = match self.store.list(Tier::Weekly, scope).await {
            Ok(weeks) => weeks,
            Err(error) => {
                tracing::warn!(
                    scope = %scope,
                    month = %month,
                    error = %error,
                    "failed to list weekly memory"
                );
                return Some(PeriodOutcome::failed(Tier::Monthly, scope, &month, error.to_string()));
            }
        };
        weeks.retain(|week| {
            week.starts_with(&year_prefix) && week_overlaps_month(week, month_start)
        });
        weeks.sort();

        let mut sources = Vec::new();
        for week in weeks {
            match self.store.get(Tier::Weekly, scope, &week).await {
                Ok(Some(content)) => sources.push((week, content)),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        scope = %scope,
                        month = %month,
                        error = %error,
                        "failed to read weekly memory for month"
                    );
                    return Some(PeriodOutcome::failed(
                        Tier::Monthly,
                        scope,
                        &month,
                        error.to_string(),
                    ));
                }
            }
        }
        if sources.is_empty() {
            return None;
        }
        let entries_in = sources.len();
        let groups = group_sections("Week ", &sources);
        Some(
            self.summarize_and_store(
                Tier::Monthly,
                scope,
                &month,
                entries_in,
                groups,
                MONTHLY_INSTRUCTION,
            )
            .await,
        )
    }

    /// Summarize each channel group, write the artifact, and describe the result.
    async fn summarize_and_store(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        entries_in: usize,
        groups: Vec<(Option<String>, String)>,
        instruction: &str,
    ) -> PeriodOutcome {
        let mut sections = Vec::with_capacity(groups.len());
        let mut degraded = false;
        let mut input_tokens = 0;
        let mut output_tokens = 0;

        for (channel, source) in groups {
            let summary = self.summarize_section(instruction, &source, scope, identifier).await;
            degraded |= summary.degraded;
            input_tokens += summary.input_tokens;
            output_tokens += summary.output_tokens;
            sections.push(Section {
                channel,
                body: summary.text,
            });
        }

        let content = render_sections(&sections);
        if let Err(error) = self.store.put(tier, scope, identifier, &content).await {
            tracing::warn!(
                tier = %tier,
                scope = %scope,
                identifier,
                error = %error,
                "failed to write compacted memory"
            );
            return PeriodOutcome::failed(tier, scope, identifier, error.to_string());
        }

        let outcome = PeriodOutcome {
            tier,
            scope: scope.clone(),
            identifier: identifier.to_string(),
            status: if degraded {
                PeriodStatus::Degraded
            } else {
                PeriodStatus::Summarized
            },
            entries_in,
            chars_out: content.chars().count(),
            tokens_out: estimate_tokens(&content),
            input_tokens,
            output_tokens,
        };
        tracing::info!(
            tier = %tier,
            scope = %scope,
            identifier,
            entries_in = outcome.entries_in,
            chars_out = outcome.chars_out,
            tokens_out = outcome.tokens_out,
            degraded,
            "compacted memory"
        );
        outcome
    }

    async fn summarize_section(
        &self,
        instruction: &str,
        source: &str,
        scope: &Scope,
        identifier: &str,
    ) -> SectionSummary {
        let call = self.summarizer.summarize(instruction, source);
        let failure = match tokio::time::timeout(self.settings.summarizer_timeout, call).await {
            Ok(Ok(summary)) if !summary.text.trim().is_empty() => {
                return SectionSummary {
                    text: summary.text.trim().to_string(),
                    degraded: false,
                    input_tokens: summary.input_tokens,
                    output_tokens: summary.output_tokens,
                };
            }
            Ok(Ok(_)) => "summarizer returned empty text".to_string(),
            Ok(Err(error)) => format!("summarizer failed: {error:#}"),
            Err(_) => format!(
                "summarizer timed out after {}s",
                self.settings.summarizer_timeout.as_secs()
            ),
        };

        tracing::warn!(
            summarizer = self.summarizer.name(),
            scope = %scope,
            identifier,
            reason = %failure,
            "keeping verbatim source as summary"
        );
        SectionSummary {
            text: source.to_string(),
            degraded: true,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    async fn record_usage(&self, report: &CompactionReport) {
        if report.periods.is_empty() && report.retention.is_empty() {
            return;
        }
        let (input_tokens, output_tokens) = (report.input_tokens(), report.output_tokens());
        let record = CompactionUsageRecord {
            id: report.run_id.clone(),
            run_date: date_id(report.today),
            provider: self.summarizer.name().to_string(),
            model: self.summarizer.model().to_string(),
            periods_total: report.periods.len() as u64,
            periods_degraded: report.degraded() as u64,
            periods_failed: report.failed() as u64,
            input_tokens,
            output_tokens,
            estimated_cost_micros: lookup_pricing(self.summarizer.model(), &self.pricing)
                .map(|pricing| pricing.estimate_cost_micros(input_tokens, output_tokens)),
            success: report.success(),
            created_at: Utc::now().to_rfc3339(),
        };
        if let Err(error) = self.usage.record(&record).await {
            tracing::warn!(
                run_id = %report.run_id,
                error = %error,
                "failed to record compaction usage"
            );
        }
    }
}

/// Regroup sectioned artifacts by channel: each channel gets its own source
/// made of `## <prefix><label>` blocks, in artifact order. Untitled sections
/// (per-channel scopes) form a single group.
pub(super) fn group_sections(
    prefix: &str,
    artifacts: &[(String, String)],
) -> Vec<(Option<String>, String)> {
    let mut by_channel: BTreeMap<Option<String>, Vec<(String, String)>> = BTreeMap::new();
    for (label, content) in artifacts {
        for section in parse_sections(content) {
            by_channel
                .entry(section.channel)
                .or_default()
                .push((label.clone(), section.body));
        }
    }
    by_channel
        .into_iter()
        .map(|(channel, items)| (channel, sectioned_source(prefix, &items)))
        .collect()
}
