#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use channel_memory::error::MemoryError;
use channel_memory::llm::{Summarizer, Summary};
use channel_memory::memory::compaction::{CompactionEngine, CompactionSettings};
use channel_memory::memory::store::{InMemoryTierStore, TierStore};
use channel_memory::memory::types::{RawEntry, Scope, Tier, encode_jsonl};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hour, minute, 0).unwrap()
}

pub fn channel(id: &str) -> Scope {
    Scope::Channel(id.to_string())
}

pub fn entry(
    channel_id: &str,
    channel_name: &str,
    timestamp: DateTime<Utc>,
    text: &str,
) -> RawEntry {
    RawEntry {
        timestamp,
        channel_id: channel_id.to_string(),
        channel_name: channel_name.to_string(),
        author: "ana".to_string(),
        text: text.to_string(),
        session_id: "harness".to_string(),
        thread_id: None,
    }
}

/// Append `entries` to the raw artifact of the day of their first timestamp.
pub async fn seed_raw(store: &dyn TierStore, scope: &Scope, entries: &[RawEntry]) {
    let day = entries[0].timestamp.format("%Y-%m-%d").to_string();
    store
        .append(Tier::Raw, scope, &day, &encode_jsonl(entries).unwrap())
        .await
        .unwrap();
}

pub async fn read(
    store: &dyn TierStore,
    tier: Tier,
    scope: &Scope,
    identifier: &str,
) -> Option<String> {
    store.get(tier, scope, identifier).await.unwrap()
}

/// Deterministic summarizer: `"<tag>: <source>"`, recording every call.
pub struct ScriptedSummarizer {
    tag: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedSummarizer {
    pub fn new(tag: &str) -> Arc<Self> {
        Arc::new(Self {
            tag: tag.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sources(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, source)| source).collect()
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "gpt-4o-mini"
    }

    async fn summarize(&self, instruction: &str, source: &str) -> Result<Summary> {
        self.calls
            .lock()
            .unwrap()
            .push((instruction.to_string(), source.to_string()));
        Ok(Summary::new(format!("{}: {source}", self.tag), 100, 10))
    }
}

/// Always errors, as an unreachable provider would.
pub struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn summarize(&self, _instruction: &str, _source: &str) -> Result<Summary> {
        bail!("provider unreachable")
    }
}

/// Never answers within any sane timeout.
pub struct SlowSummarizer;

#[async_trait]
impl Summarizer for SlowSummarizer {
    fn name(&self) -> &str {
        "slow"
    }

    async fn summarize(&self, _instruction: &str, source: &str) -> Result<Summary> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Summary::new(source.to_string(), 0, 0))
    }
}

pub fn engine(
    store: Arc<InMemoryTierStore>,
    summarizer: Arc<dyn Summarizer>,
    settings: CompactionSettings,
) -> CompactionEngine {
    CompactionEngine::new(store, summarizer, settings)
}

/// Store whose raw appends can be switched off while summary writes keep
/// working, as with a full disk on the raw volume only.
pub struct FlakyAppendStore {
    inner: Arc<InMemoryTierStore>,
    fail_appends: AtomicBool,
}

impl FlakyAppendStore {
    pub fn new(inner: Arc<InMemoryTierStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_appends: AtomicBool::new(false),
        })
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TierStore for FlakyAppendStore {
    fn name(&self) -> &str {
        "flaky-append"
    }

    async fn put(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        content: &str,
    ) -> Result<(), MemoryError> {
        self.inner.put(tier, scope, identifier, content).await
    }

    async fn append(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        content: &str,
    ) -> Result<(), MemoryError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(MemoryError::Unavailable("appends disabled".into()));
        }
        self.inner.append(tier, scope, identifier, content).await
    }

    async fn get(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
    ) -> Result<Option<String>, MemoryError> {
        self.inner.get(tier, scope, identifier).await
    }

    async fn list(&self, tier: Tier, scope: &Scope) -> Result<Vec<String>, MemoryError> {
        self.inner.list(tier, scope).await
    }

    async fn delete(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
    ) -> Result<bool, MemoryError> {
        self.inner.delete(tier, scope, identifier).await
    }

    async fn scopes(&self) -> Result<Vec<Scope>, MemoryError> {
        self.inner.scopes().await
    }
}
