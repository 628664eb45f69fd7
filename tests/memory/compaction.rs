use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use channel_memory::memory::compaction::{CompactionEngine, CompactionSettings, PeriodStatus};
use channel_memory::memory::store::{InMemoryTierStore, TierStore};
use channel_memory::memory::types::{ChannelInfo, Scope, Tier};
use channel_memory::memory::{IngestionBuffer, ScopeMode};
use channel_memory::usage::{SqliteUsageTracker, UsageTracker};

use super::memory_harness::{
    FailingSummarizer, FlakyAppendStore, ScriptedSummarizer, SlowSummarizer, at, channel, date,
    engine, entry, read, seed_raw,
};

fn general() -> Vec<ChannelInfo> {
    vec![ChannelInfo::new("100", "general")]
}

#[tokio::test]
async fn monday_run_builds_last_weeks_summary_from_its_dailies() {
    let store = Arc::new(InMemoryTierStore::new());
    let scope = channel("100");
    let week = [
        ("2026-01-26", "kickoff for v2"),
        ("2026-01-27", "scoped the storage work"),
        ("2026-01-28", "picked sqlite"),
        ("2026-01-29", "schema review"),
        ("2026-01-30", "load test passed"),
        ("2026-01-31", "quiet saturday"),
    ];
    for (day, notes) in week.iter().chain(&[("2026-01-25", "previous week")]) {
        store.put(Tier::Daily, &scope, day, notes).await.unwrap();
    }
    seed_raw(
        store.as_ref(),
        &scope,
        &[entry("100", "general", at(2026, 2, 1, 9, 0), "shipped the release")],
    )
    .await;

    let summarizer = ScriptedSummarizer::new("S");
    let engine = engine(store.clone(), summarizer.clone(), CompactionSettings::default());
    let report = engine.run_daily_compaction(&general(), date(2026, 2, 2)).await;

    assert!(report.success(), "{report:?}");
    let daily = report.find(Tier::Daily, &scope, "2026-02-01").unwrap();
    assert_eq!(daily.entries_in, 1);
    let weekly = report.find(Tier::Weekly, &scope, "2026-W05").unwrap();
    assert_eq!(weekly.status, PeriodStatus::Summarized);
    assert_eq!(weekly.entries_in, 7);

    let content = read(store.as_ref(), Tier::Weekly, &scope, "2026-W05").await.unwrap();
    assert!(content.starts_with("S: ## 2026-01-26\nkickoff for v2"));
    for (day, notes) in week {
        assert!(content.contains(&format!("## {day}\n{notes}")), "missing {day}");
    }
    assert!(content.contains("## 2026-02-01\nS: [09:00] ana: shipped the release"));
    assert!(!content.contains("previous week"));

    // Per-channel raw stays on disk after its daily exists.
    assert!(read(store.as_ref(), Tier::Raw, &scope, "2026-02-01").await.is_some());
}

#[tokio::test]
async fn first_of_month_builds_monthly_then_applies_retention() {
    let store = Arc::new(InMemoryTierStore::new());
    let scope = channel("100");
    for month in ["2025-10", "2025-11", "2025-12", "2026-01"] {
        store.put(Tier::Monthly, &scope, month, month).await.unwrap();
    }
    for week in ["2026-W04", "2026-W05", "2026-W06", "2026-W09"] {
        store
            .put(Tier::Weekly, &scope, week, &format!("notes {week}"))
            .await
            .unwrap();
    }

    let summarizer = ScriptedSummarizer::new("M");
    let settings = CompactionSettings {
        retention_months: 2,
        ..CompactionSettings::default()
    };
    let engine = engine(store.clone(), summarizer.clone(), settings);
    let report = engine.run_daily_compaction(&general(), date(2026, 3, 1)).await;

    let monthly = report.find(Tier::Monthly, &scope, "2026-02").unwrap();
    assert_eq!(monthly.entries_in, 3);
    let source = &summarizer.sources()[0];
    assert!(source.starts_with("## Week 2026-W05\nnotes 2026-W05"));
    assert!(source.contains("## Week 2026-W09"));
    assert!(!source.contains("2026-W04"));

    assert_eq!(
        store.list(Tier::Monthly, &scope).await.unwrap(),
        vec!["2026-02", "2026-01"]
    );
    let (retained_scope, retention) = &report.retention[0];
    assert_eq!(retained_scope, &scope);
    assert_eq!(retention.deleted, vec!["2025-12", "2025-11", "2025-10"]);
    assert_eq!(store.list(Tier::Weekly, &scope).await.unwrap().len(), 4);
}

#[tokio::test]
async fn rerunning_the_same_day_rewrites_identical_artifacts() {
    let store = Arc::new(InMemoryTierStore::new());
    let scope = channel("100");
    seed_raw(
        store.as_ref(),
        &scope,
        &[
            entry("100", "general", at(2026, 2, 3, 9, 0), "standup at ten"),
            entry("100", "general", at(2026, 2, 3, 9, 2), "agreed"),
        ],
    )
    .await;

    let engine = engine(store.clone(), ScriptedSummarizer::new("S"), CompactionSettings::default());
    engine.run_daily_compaction(&general(), date(2026, 2, 4)).await;
    let first = read(store.as_ref(), Tier::Daily, &scope, "2026-02-03").await;
    engine.run_daily_compaction(&general(), date(2026, 2, 4)).await;
    let second = read(store.as_ref(), Tier::Daily, &scope, "2026-02-03").await;

    assert_eq!(first, second);
    assert_eq!(
        first.as_deref(),
        Some("S: [09:00] ana: standup at ten\n[09:02] ana: agreed")
    );
}

#[tokio::test]
async fn server_wide_daily_has_one_section_per_channel_and_consumes_raw() {
    let store = Arc::new(InMemoryTierStore::new());
    seed_raw(
        store.as_ref(),
        &Scope::Server,
        &[
            entry("200", "random", at(2026, 2, 3, 8, 0), "lunch poll"),
            entry("100", "general", at(2026, 2, 3, 9, 0), "deploy friday"),
        ],
    )
    .await;

    let settings = CompactionSettings {
        mode: ScopeMode::ServerWide,
        ..CompactionSettings::default()
    };
    let engine = engine(store.clone(), ScriptedSummarizer::new("S"), settings);
    let report = engine.run_daily_compaction(&[], date(2026, 2, 4)).await;
    assert!(report.success());

    let daily = read(store.as_ref(), Tier::Daily, &Scope::Server, "2026-02-03").await.unwrap();
    assert_eq!(
        daily,
        "< #general >\nS: [09:00] ana: deploy friday\n\n< #random >\nS: [08:00] ana: lunch poll"
    );
    assert!(read(store.as_ref(), Tier::Raw, &Scope::Server, "2026-02-03").await.is_none());
}

#[tokio::test]
async fn failing_summarizer_degrades_to_verbatim_and_is_tracked() {
    let tmp = TempDir::new().unwrap();
    let usage = Arc::new(SqliteUsageTracker::open(&tmp.path().join("usage.db")).await.unwrap());
    let store = Arc::new(InMemoryTierStore::new());
    let scope = channel("100");
    seed_raw(
        store.as_ref(),
        &scope,
        &[entry("100", "general", at(2026, 2, 3, 9, 0), "keep me")],
    )
    .await;

    let engine = engine(store.clone(), Arc::new(FailingSummarizer), CompactionSettings::default())
        .with_usage_tracker(usage.clone());
    let report = engine.run_daily_compaction(&general(), date(2026, 2, 4)).await;

    assert_eq!(report.degraded(), 1);
    assert!(!report.success());
    assert_eq!(
        read(store.as_ref(), Tier::Daily, &scope, "2026-02-03").await.as_deref(),
        Some("[09:00] ana: keep me")
    );

    let summary = usage.summary().await.unwrap();
    assert_eq!(summary.run_count, 1);
    assert_eq!(summary.failed_run_count, 1);
}

#[tokio::test(start_paused = true)]
async fn slow_summarizer_times_out_without_stalling_the_run() {
    let store = Arc::new(InMemoryTierStore::new());
    for id in ["100", "200"] {
        seed_raw(
            store.as_ref(),
            &channel(id),
            &[entry(id, "chan", at(2026, 2, 3, 9, 0), "slow day")],
        )
        .await;
    }
    let settings = CompactionSettings {
        summarizer_timeout: Duration::from_secs(5),
        ..CompactionSettings::default()
    };
    let channels = vec![ChannelInfo::new("100", "a"), ChannelInfo::new("200", "b")];

    let engine = engine(store.clone(), Arc::new(SlowSummarizer), settings);
    let report = engine.run_daily_compaction(&channels, date(2026, 2, 4)).await;

    assert_eq!(report.periods.len(), 2);
    assert_eq!(report.degraded(), 2);
    assert!(read(store.as_ref(), Tier::Daily, &channel("200"), "2026-02-03").await.is_some());
}

#[tokio::test]
async fn failed_write_is_retried_by_the_next_run() {
    let store = Arc::new(InMemoryTierStore::new());
    let scope = channel("100");
    seed_raw(
        store.as_ref(),
        &scope,
        &[entry("100", "general", at(2026, 2, 2, 9, 0), "missed day")],
    )
    .await;

    let engine = engine(store.clone(), ScriptedSummarizer::new("S"), CompactionSettings::default());
    store.set_fail_writes(true);
    let report = engine.run_daily_compaction(&general(), date(2026, 2, 3)).await;
    assert_eq!(report.failed(), 1);

    store.set_fail_writes(false);
    let report = engine.run_daily_compaction(&general(), date(2026, 2, 5)).await;
    assert!(report.find(Tier::Daily, &scope, "2026-02-02").is_some());
    assert!(read(store.as_ref(), Tier::Daily, &scope, "2026-02-02").await.is_some());
}

#[tokio::test]
async fn unwritten_buffered_entries_hold_back_their_day() {
    let inner = Arc::new(InMemoryTierStore::new());
    let store = FlakyAppendStore::new(inner.clone());
    let buffer = IngestionBuffer::new(store.clone(), Duration::from_secs(30));
    buffer.record(
        Scope::Server,
        entry("100", "general", at(2026, 2, 3, 22, 0), "flushed one"),
    );
    buffer.flush_all().await.unwrap();

    store.fail_appends(true);
    buffer.record(
        Scope::Server,
        entry("100", "general", at(2026, 2, 3, 22, 5), "unflushed decision"),
    );

    let settings = CompactionSettings {
        mode: ScopeMode::ServerWide,
        ..CompactionSettings::default()
    };
    let engine = CompactionEngine::new(store.clone(), ScriptedSummarizer::new("S"), settings)
        .with_buffer(buffer.clone());
    let report = engine.run_daily_compaction(&general(), date(2026, 2, 4)).await;

    assert!(!report.success());
    let daily = report.find(Tier::Daily, &Scope::Server, "2026-02-03").unwrap();
    assert!(matches!(daily.status, PeriodStatus::Failed(_)));
    assert!(read(inner.as_ref(), Tier::Daily, &Scope::Server, "2026-02-03").await.is_none());
    assert!(read(inner.as_ref(), Tier::Raw, &Scope::Server, "2026-02-03").await.is_some());
    assert_eq!(buffer.unpersisted_count(), 1);

    store.fail_appends(false);
    let report = engine.run_daily_compaction(&general(), date(2026, 2, 4)).await;

    assert!(report.success(), "{report:?}");
    let daily = read(inner.as_ref(), Tier::Daily, &Scope::Server, "2026-02-03").await.unwrap();
    assert!(daily.contains("flushed one"));
    assert!(daily.contains("unflushed decision"));
    assert!(read(inner.as_ref(), Tier::Raw, &Scope::Server, "2026-02-03").await.is_none());
    assert_eq!(buffer.unpersisted_count(), 0);
}
