use std::sync::Arc;
use std::time::Duration;

use channel_memory::channels::ChannelDirectory;
use channel_memory::memory::store::{InMemoryTierStore, TierStore};
use channel_memory::memory::types::{ChannelInfo, Scope, Tier};
use channel_memory::memory::{IngestionBuffer, MemoryRetriever, render_channel_context};

use super::memory_harness::{at, channel, date, entry, seed_raw};

fn chars(n: usize) -> String {
    "x".repeat(n)
}

fn directory() -> Arc<ChannelDirectory> {
    Arc::new(ChannelDirectory::new(&[
        ChannelInfo::new("100", "general"),
        ChannelInfo::new("200", "random"),
    ]))
}

fn retriever(store: Arc<InMemoryTierStore>) -> MemoryRetriever {
    MemoryRetriever::new(store, None, directory())
}

#[tokio::test]
async fn budget_is_filled_whole_items_newest_first() {
    let store = Arc::new(InMemoryTierStore::new());
    let scope = channel("100");
    store.put(Tier::Daily, &scope, "2026-02-03", &chars(160)).await.unwrap();
    store.put(Tier::Daily, &scope, "2026-02-02", &chars(200)).await.unwrap();
    store.put(Tier::Daily, &scope, "2026-02-01", &chars(120)).await.unwrap();

    let result = retriever(store)
        .load_memories_for_channel_at("100", 100, date(2026, 2, 4))
        .await;

    let tokens: Vec<usize> = result.memories.iter().map(|m| m.token_count).collect();
    assert_eq!(tokens, vec![40, 50]);
    assert_eq!(result.total_tokens, 90);
    assert!((result.budget_used - 90.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn tiers_are_read_finest_first() {
    let store = Arc::new(InMemoryTierStore::new());
    let scope = channel("100");
    seed_raw(
        store.as_ref(),
        &scope,
        &[entry("100", "general", at(2026, 2, 4, 9, 0), "today's chat")],
    )
    .await;
    store.put(Tier::Monthly, &scope, "2026-01", "january").await.unwrap();
    store.put(Tier::Weekly, &scope, "2026-W05", "last week").await.unwrap();
    store.put(Tier::Daily, &scope, "2026-02-03", "yesterday").await.unwrap();

    let result = retriever(store)
        .load_memories_for_channel_at("100", 1000, date(2026, 2, 4))
        .await;

    let order: Vec<(Tier, &str)> = result
        .memories
        .iter()
        .map(|m| (m.tier, m.identifier.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (Tier::Raw, "2026-02-04"),
            (Tier::Daily, "2026-02-03"),
            (Tier::Weekly, "2026-W05"),
            (Tier::Monthly, "2026-01"),
        ]
    );
    assert!(result.memories.iter().all(|m| m.channel_name == "general"));

    let rendered = render_channel_context(&result);
    assert!(
        rendered.starts_with("## Recent Memory\n### Today (2026-02-04)\n[09:00] ana: today's chat")
    );
    assert!(rendered.contains("## Long Term Memory\n### Week 2026-W05\nlast week"));
}

#[tokio::test]
async fn oversized_raw_is_truncated_to_the_budget_and_ends_the_result() {
    let store = Arc::new(InMemoryTierStore::new());
    let scope = channel("100");
    let entries: Vec<_> = (0..40)
        .map(|i| entry("100", "general", at(2026, 2, 4, 9, i), &format!("message number {i}")))
        .collect();
    seed_raw(store.as_ref(), &scope, &entries).await;
    store.put(Tier::Daily, &scope, "2026-02-03", "short").await.unwrap();

    let result = retriever(store)
        .load_memories_for_channel_at("100", 50, date(2026, 2, 4))
        .await;

    assert_eq!(result.memories.len(), 1);
    let raw = &result.memories[0];
    assert_eq!(raw.tier, Tier::Raw);
    assert_eq!(raw.token_count, 50);
    assert_eq!(result.total_tokens, 50);
    assert!(raw.content.ends_with("message number 39"));
    assert!(!raw.content.contains("message number 0\n"));
    assert!(raw.content.chars().count() <= 200);
}

#[tokio::test]
async fn server_memory_puts_the_current_channel_first() {
    let store = Arc::new(InMemoryTierStore::new());
    store
        .put(
            Tier::Daily,
            &Scope::Server,
            "2026-02-03",
            "< #general >\nrelease notes\n\n< #random >\nlunch poll",
        )
        .await
        .unwrap();

    let channels = vec![
        ChannelInfo::new("100", "general"),
        ChannelInfo::new("200", "random"),
    ];
    let result = retriever(store)
        .load_memories_for_server_at("200", &channels, 1000, date(2026, 2, 4))
        .await;

    let names: Vec<&str> = result.memories.iter().map(|m| m.channel_name.as_str()).collect();
    assert_eq!(names, vec!["random", "general"]);
    assert_eq!(result.memories[0].content, "lunch poll");
}

#[tokio::test]
async fn buffered_entries_are_visible_before_they_are_flushed() {
    let store = Arc::new(InMemoryTierStore::new());
    let buffer = IngestionBuffer::new(store.clone(), Duration::from_secs(30));
    buffer.record(
        channel("100"),
        entry("100", "general", at(2026, 2, 4, 9, 0), "not on disk yet"),
    );
    let retriever = MemoryRetriever::new(store.clone(), Some(buffer), directory());

    let result = retriever
        .load_memories_for_channel_at("100", 100, date(2026, 2, 4))
        .await;

    assert_eq!(store.write_count(), 0);
    assert_eq!(result.memories[0].content, "[09:00] ana: not on disk yet");
}

#[tokio::test]
async fn empty_store_yields_an_empty_result() {
    let result = retriever(Arc::new(InMemoryTierStore::new()))
        .load_memories_for_channel_at("100", 100, date(2026, 2, 4))
        .await;
    assert!(result.is_empty());
    assert_eq!(result.total_tokens, 0);
    assert_eq!(result.budget_used, 0.0);
}
