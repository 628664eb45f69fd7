use super::{TierStore, ensure_appendable, newest_first};
use crate::error::MemoryError;
use crate::memory::types::{Scope, Tier};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

type ArtifactKey = (Scope, Tier, String);

/// Volatile tier store. Used for tests and by embedders that keep memory
/// only for the lifetime of the process. Writes can be made to fail on
/// demand to exercise the degraded paths.
#[derive(Default)]
pub struct InMemoryTierStore {
    artifacts: Mutex<BTreeMap<ArtifactKey, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryTierStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put`/`append`/`delete` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `put`/`append` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ArtifactKey, String>> {
        self.artifacts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), MemoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MemoryError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    fn key(tier: Tier, scope: &Scope, identifier: &str) -> Result<ArtifactKey, MemoryError> {
        tier.validate_identifier(identifier)?;
        Ok((scope.clone(), tier, identifier.to_string()))
    }
}

#[async_trait]
impl TierStore for InMemoryTierStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn put(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        content: &str,
    ) -> Result<(), MemoryError> {
        self.check_writable()?;
        let key = Self::key(tier, scope, identifier)?;
        self.lock().insert(key, content.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        content: &str,
    ) -> Result<(), MemoryError> {
        ensure_appendable(tier)?;
        self.check_writable()?;
        let key = Self::key(tier, scope, identifier)?;
        let mut artifacts = self.lock();
        let existing = artifacts.entry(key).or_default();
        if !existing.is_empty() && !existing.ends_with('\n') {
            existing.push('\n');
        }
        existing.push_str(content);
        drop(artifacts);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
    ) -> Result<Option<String>, MemoryError> {
        let key = Self::key(tier, scope, identifier)?;
        Ok(self.lock().get(&key).cloned())
    }

    async fn list(&self, tier: Tier, scope: &Scope) -> Result<Vec<String>, MemoryError> {
        let identifiers = self
            .lock()
            .keys()
            .filter(|(s, t, _)| s == scope && *t == tier)
            .map(|(_, _, id)| id.clone())
            .collect();
        Ok(newest_first(identifiers))
    }

    async fn delete(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
    ) -> Result<bool, MemoryError> {
        self.check_writable()?;
        let key = Self::key(tier, scope, identifier)?;
        Ok(self.lock().remove(&key).is_some())
    }

    async fn scopes(&self) -> Result<Vec<Scope>, MemoryError> {
        let mut scopes: Vec<Scope> = self.lock().keys().map(|(s, _, _)| s.clone()).collect();
        scopes.dedup();
        Ok(scopes)
    }
}
