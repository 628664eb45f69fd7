use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use channel_memory::channels::ChannelDirectory;
use channel_memory::memory::store::{FileTierStore, InMemoryTierStore, TierStore};
use channel_memory::memory::types::{ChannelInfo, Scope, Tier, decode_jsonl};
use channel_memory::memory::{IngestionBuffer, MemoryRecorder, ScopeMode};

use super::memory_harness::{at, channel, date, read};

const THROTTLE: Duration = Duration::from_secs(30);

fn recorder(store: Arc<dyn TierStore>, mode: ScopeMode) -> MemoryRecorder {
    let buffer = IngestionBuffer::new(store, THROTTLE);
    let directory = Arc::new(ChannelDirectory::new(&[
        ChannelInfo::new("100", "general"),
        ChannelInfo::new("200", "random"),
    ]));
    MemoryRecorder::new(buffer, directory, mode)
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn burst_of_three_is_written_once_after_the_throttle() {
    let store = Arc::new(InMemoryTierStore::new());
    let recorder = recorder(store.clone(), ScopeMode::PerChannel);

    for (minute, text) in [(0, "one"), (1, "two"), (2, "three")] {
        assert!(recorder.record_at("100", None, "ana", text, at(2026, 2, 4, 9, minute)));
        sleep_secs(5).await;
    }
    assert_eq!(store.write_count(), 0);

    sleep_secs(16).await;
    assert_eq!(store.write_count(), 1);

    let raw = read(store.as_ref(), Tier::Raw, &channel("100"), "2026-02-04").await.unwrap();
    let texts: Vec<String> = decode_jsonl(&raw).into_iter().map(|e| e.text).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[tokio::test(start_paused = true)]
async fn later_messages_append_without_rewriting_earlier_ones() {
    let store = Arc::new(InMemoryTierStore::new());
    let recorder = recorder(store.clone(), ScopeMode::PerChannel);

    recorder.record_at("100", None, "ana", "first", at(2026, 2, 4, 9, 0));
    sleep_secs(31).await;

    recorder.record_at("100", Some("77"), "bo", "reply", at(2026, 2, 4, 9, 5));
    sleep_secs(31).await;

    assert_eq!(store.write_count(), 2);
    let raw = read(store.as_ref(), Tier::Raw, &channel("100"), "2026-02-04").await.unwrap();
    let entries = decode_jsonl(&raw);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].thread_id.as_deref(), Some("77"));
    assert_eq!(entries[0].session_id, entries[1].session_id);
}

#[tokio::test(start_paused = true)]
async fn server_wide_mode_shares_one_raw_file() {
    let store = Arc::new(InMemoryTierStore::new());
    let recorder = recorder(store.clone(), ScopeMode::ServerWide);

    recorder.record_at("100", None, "ana", "in general", at(2026, 2, 4, 9, 0));
    recorder.record_at("200", None, "bo", "in random", at(2026, 2, 4, 9, 1));
    recorder.buffer().flush_all().await.unwrap();

    let raw = read(store.as_ref(), Tier::Raw, &Scope::Server, "2026-02-04").await.unwrap();
    let names: Vec<String> = decode_jsonl(&raw).into_iter().map(|e| e.channel_name).collect();
    assert_eq!(names, vec!["general", "random"]);
    assert!(read(store.as_ref(), Tier::Raw, &channel("100"), "2026-02-04").await.is_none());
}

#[tokio::test]
async fn restart_rehydrates_and_keeps_appending() {
    let tmp = TempDir::new().unwrap();
    let day = date(2026, 2, 4);

    let first = recorder(Arc::new(FileTierStore::new(tmp.path())), ScopeMode::PerChannel);
    first.record_at("100", None, "ana", "before restart", at(2026, 2, 4, 9, 0));
    first.buffer().flush_all().await.unwrap();
    drop(first);

    let store: Arc<dyn TierStore> = Arc::new(FileTierStore::new(tmp.path()));
    let second = recorder(store.clone(), ScopeMode::PerChannel);
    assert_eq!(second.buffer().load_day_from_disk(day).await.unwrap(), 1);
    assert_eq!(second.buffer().snapshot(&channel("100"), day).unwrap().len(), 1);

    second.record_at("100", None, "ana", "after restart", at(2026, 2, 4, 10, 0));
    assert_eq!(second.buffer().flush_all().await.unwrap(), 1);

    let raw = read(store.as_ref(), Tier::Raw, &channel("100"), "2026-02-04").await.unwrap();
    let texts: Vec<String> = decode_jsonl(&raw).into_iter().map(|e| e.text).collect();
    assert_eq!(texts, vec!["before restart", "after restart"]);
}

#[tokio::test]
async fn torn_final_line_costs_only_that_line() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn TierStore> = Arc::new(FileTierStore::new(tmp.path()));
    let recorder = recorder(store.clone(), ScopeMode::PerChannel);
    recorder.record_at("100", None, "ana", "whole", at(2026, 2, 4, 9, 0));
    recorder.buffer().flush_all().await.unwrap();

    store
        .append(Tier::Raw, &channel("100"), "2026-02-04", "{\"timestamp\":\"2026-02-04T09:")
        .await
        .unwrap();

    let raw = read(store.as_ref(), Tier::Raw, &channel("100"), "2026-02-04").await.unwrap();
    let entries = decode_jsonl(&raw);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "whole");
}

#[tokio::test]
async fn messages_flushed_after_a_torn_line_are_kept() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn TierStore> = Arc::new(FileTierStore::new(tmp.path()));
    let before = recorder(store.clone(), ScopeMode::PerChannel);
    before.record_at("100", None, "ana", "before crash", at(2026, 2, 4, 9, 0));
    before.buffer().flush_all().await.unwrap();
    store
        .append(Tier::Raw, &channel("100"), "2026-02-04", "{\"timestamp\":\"2026-02-04T09:")
        .await
        .unwrap();

    let after = recorder(store.clone(), ScopeMode::PerChannel);
    after.buffer().load_from_disk().await.unwrap();
    after.record_at("100", None, "bo", "after restart", at(2026, 2, 4, 10, 0));
    assert_eq!(after.buffer().flush_all().await.unwrap(), 1);

    let raw = read(store.as_ref(), Tier::Raw, &channel("100"), "2026-02-04").await.unwrap();
    let texts: Vec<String> = decode_jsonl(&raw).into_iter().map(|e| e.text).collect();
    assert_eq!(texts, vec!["before crash", "after restart"]);
}
