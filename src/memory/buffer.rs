//! Throttled ingestion buffer.
//!
//! Every incoming message lands in an in-process per-scope list. Flushes are
//! throttled, not debounced: a scope flushes at most once per throttle window,
//! and any number of records inside a window coalesce into the single pending
//! flush. Entries stay in memory until a write for them has succeeded.

use super::period::date_id;
use super::store::TierStore;
use super::types::{RawEntry, Scope, Tier, decode_jsonl, encode_jsonl};
use crate::error::MemoryError;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_FLUSH_THROTTLE: Duration = Duration::from_secs(30);

/// Per-process raw memory buffer. Cheap to clone; clones share state.
///
/// Must be used from within a Tokio runtime: `record` spawns the deferred
/// flush task.
#[derive(Clone)]
pub struct IngestionBuffer {
    inner: Arc<BufferInner>,
}

struct BufferInner {
    store: Arc<dyn TierStore>,
    throttle: Duration,
    session_id: String,
    scopes: Mutex<HashMap<Scope, ScopeBuffer>>,
}

#[derive(Default)]
struct ScopeBuffer {
    days: BTreeMap<NaiveDate, DayLog>,
    /// Start of the current throttle window: the last flush, or the first
    /// record if this scope has never flushed.
    window_start: Option<Instant>,
    pending: Option<PendingFlush>,
    next_generation: u64,
    /// Serializes writes for this scope.
    flush_lock: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Default)]
struct DayLog {
    entries: Vec<RawEntry>,
    /// Count of leading entries already written to the store.
    persisted: usize,
}

struct PendingFlush {
    generation: u64,
    handle: JoinHandle<()>,
}

impl IngestionBuffer {
    pub fn new(store: Arc<dyn TierStore>, throttle: Duration) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                store,
                throttle,
                session_id: uuid::Uuid::new_v4().to_string(),
                scopes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Identifier stamped on every entry recorded by this process.
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn throttle(&self) -> Duration {
        self.inner.throttle
    }

    fn lock_scopes(&self) -> MutexGuard<'_, HashMap<Scope, ScopeBuffer>> {
        self.inner
            .scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one entry and make sure a flush is scheduled for its scope.
    pub fn record(&self, scope: Scope, entry: RawEntry) {
        let mut scopes = self.lock_scopes();
        let buffer = scopes.entry(scope.clone()).or_default();
        buffer.days.entry(entry.date()).or_default().entries.push(entry);
        self.schedule_locked(&scope, buffer);
    }

    /// Schedule the scope's flush unless one is already pending.
    fn schedule_locked(&self, scope: &Scope, buffer: &mut ScopeBuffer) {
        if buffer.pending.is_some() {
            return;
        }
        let now = Instant::now();
        let window_start = *buffer.window_start.get_or_insert(now);
        let delay = self
            .inner
            .throttle
            .saturating_sub(now.saturating_duration_since(window_start));

        buffer.next_generation += 1;
        let generation = buffer.next_generation;
        let handle = self.spawn_deferred_flush(scope.clone(), generation, delay);
        buffer.pending = Some(PendingFlush { generation, handle });
    }

    fn spawn_deferred_flush(
        &self,
        scope: Scope,
        generation: u64,
        delay: Duration,
    ) -> JoinHandle<()> {
        let buffer = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if !buffer.claim_pending(&scope, generation) {
                return;
            }
            match buffer.flush_scope(&scope).await {
                Ok(written) if written > 0 => {
                    tracing::debug!(scope = %scope, written, "raw memory flushed");
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        scope = %scope,
                        error = %error,
                        "raw memory flush failed; entries kept for the next flush"
                    );
                    buffer.schedule_retry(&scope);
                }
            }
        })
    }

    /// A timer owns the flush only if `flush_all` has not taken it meanwhile.
    fn claim_pending(&self, scope: &Scope, generation: u64) -> bool {
        let mut scopes = self.lock_scopes();
        let Some(buffer) = scopes.get_mut(scope) else {
            return false;
        };
        match &buffer.pending {
            Some(pending) if pending.generation == generation => {
                buffer.pending = None;
                true
            }
            _ => false,
        }
    }

    fn schedule_retry(&self, scope: &Scope) {
        let mut scopes = self.lock_scopes();
        if let Some(buffer) = scopes.get_mut(scope)
            && buffer.has_unpersisted()
        {
            self.schedule_locked(scope, buffer);
        }
    }

    /// Write every unpersisted entry of one scope. Returns the number of
    /// entries written.
    async fn flush_scope(&self, scope: &Scope) -> Result<usize, MemoryError> {
        let flush_lock = {
            let scopes = self.lock_scopes();
            match scopes.get(scope) {
                Some(buffer) => Arc::clone(&buffer.flush_lock),
                None => return Ok(0),
            }
        };
        let _guard = flush_lock.lock().await;

        let batches: Vec<(NaiveDate, usize, Vec<RawEntry>)> = {
            let mut scopes = self.lock_scopes();
            let Some(buffer) = scopes.get_mut(scope) else {
                return Ok(0);
            };
            buffer.window_start = Some(Instant::now());
            buffer
                .days
                .iter()
                .filter(|(_, log)| log.persisted < log.entries.len())
                .map(|(date, log)| {
                    (
                        *date,
                        log.entries.len(),
                        log.entries[log.persisted..].to_vec(),
                    )
                })
                .collect()
        };

        let mut written = 0;
        let mut first_error = None;
        for (date, upto, entries) in batches {
            let result = match encode_jsonl(&entries) {
                Ok(payload) => {
                    self.inner
                        .store
                        .append(Tier::Raw, scope, &date_id(date), &payload)
                        .await
                }
                Err(error) => Err(error),
            };
            match result {
                Ok(()) => {
                    written += entries.len();
                    self.mark_persisted(scope, date, upto);
                }
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        self.evict_persisted_history(scope);
        match first_error {
            Some(error) => Err(error),
            None => Ok(written),
        }
    }

    fn mark_persisted(&self, scope: &Scope, date: NaiveDate, upto: usize) {
        let mut scopes = self.lock_scopes();
        if let Some(log) = scopes.get_mut(scope).and_then(|b| b.days.get_mut(&date)) {
            log.persisted = log.persisted.max(upto.min(log.entries.len()));
        }
    }

    /// Past days that are fully on disk no longer need an in-memory copy.
    fn evict_persisted_history(&self, scope: &Scope) {
        let today = Utc::now().date_naive();
        let mut scopes = self.lock_scopes();
        if let Some(buffer) = scopes.get_mut(scope) {
            buffer
                .days
                .retain(|date, log| *date >= today || log.persisted < log.entries.len());
        }
    }

    /// Cancel every pending timer and write all scopes now. Call on shutdown.
    pub async fn flush_all(&self) -> Result<usize, MemoryError> {
        let scopes: Vec<Scope> = {
            let mut scopes = self.lock_scopes();
            for buffer in scopes.values_mut() {
                if let Some(pending) = buffer.pending.take() {
                    pending.handle.abort();
                }
            }
            scopes.keys().cloned().collect()
        };

        let mut total = 0;
        let mut first_error = None;
        for scope in scopes {
            match self.flush_scope(&scope).await {
                Ok(written) => total += written,
                Err(error) => {
                    tracing::warn!(
                        scope = %scope,
                        error = %error,
                        "raw memory flush failed during flush_all"
                    );
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(total),
        }
    }

    /// Rehydrate today's raw snapshot for every stored scope.
    pub async fn load_from_disk(&self) -> Result<usize, MemoryError> {
        self.load_day_from_disk(Utc::now().date_naive()).await
    }

    /// Rehydrate one day's raw snapshot. Days already buffered in memory are
    /// left alone, so call this before recording starts.
    pub async fn load_day_from_disk(&self, date: NaiveDate) -> Result<usize, MemoryError> {
        let identifier = date_id(date);
        let mut loaded = 0;
        for scope in self.inner.store.scopes().await? {
            let Some(raw) = self.inner.store.get(Tier::Raw, &scope, &identifier).await? else {
                continue;
            };
            let entries = decode_jsonl(&raw);
            if entries.is_empty() {
                continue;
            }

            let mut scopes = self.lock_scopes();
            let buffer = scopes.entry(scope.clone()).or_default();
            if buffer.days.contains_key(&date) {
                continue;
            }
            loaded += entries.len();
            let persisted = entries.len();
            buffer.days.insert(date, DayLog { entries, persisted });
            tracing::info!(
                scope = %scope,
                date = %identifier,
                entries = persisted,
                "rehydrated raw memory"
            );
        }
        Ok(loaded)
    }

    /// Copy of the buffered entries for one scope and day, oldest first.
    pub fn snapshot(&self, scope: &Scope, date: NaiveDate) -> Option<Vec<RawEntry>> {
        let scopes = self.lock_scopes();
        scopes
            .get(scope)
            .and_then(|b| b.days.get(&date))
            .map(|log| log.entries.clone())
    }

    /// Drop the written part of one buffered day once compaction has
    /// consumed it. Entries not yet on disk are kept for the next flush.
    /// Waits for any in-flight flush of the scope so the consumed entries are
    /// not re-written. Returns the number of entries dropped.
    pub async fn clear(&self, scope: &Scope, date: NaiveDate) -> usize {
        let flush_lock = {
            let scopes = self.lock_scopes();
            match scopes.get(scope) {
                Some(buffer) => Arc::clone(&buffer.flush_lock),
                None => return 0,
            }
        };
        let _guard = flush_lock.lock().await;

        let mut scopes = self.lock_scopes();
        let Some(buffer) = scopes.get_mut(scope) else {
            return 0;
        };
        let Some(log) = buffer.days.get_mut(&date) else {
            return 0;
        };
        let consumed = log.persisted;
        log.entries.drain(..consumed);
        log.persisted = 0;
        if log.entries.is_empty() {
            buffer.days.remove(&date);
        }
        consumed
    }

    /// Entries of one scope and day still waiting to be written.
    pub fn unpersisted_on(&self, scope: &Scope, date: NaiveDate) -> usize {
        self.lock_scopes()
            .get(scope)
            .and_then(|b| b.days.get(&date))
            .map_or(0, |log| log.entries.len() - log.persisted)
    }

    /// Entries recorded but not yet written, across all scopes.
    pub fn unpersisted_count(&self) -> usize {
        self.lock_scopes()
            .values()
            .flat_map(|b| b.days.values())
            .map(|log| log.entries.len() - log.persisted)
            .sum()
    }
}

impl ScopeBuffer {
    fn has_unpersisted(&self) -> bool {
        self.days.values().any(|log| log.persisted < log.entries.len())
    }
}
