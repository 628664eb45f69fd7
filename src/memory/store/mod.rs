mod file;
mod in_memory;

pub use file::FileTierStore;
pub use in_memory::InMemoryTierStore;

use super::types::{Scope, Tier};
use crate::error::MemoryError;
use async_trait::async_trait;

/// Persistence contract for tier artifacts, keyed by `(tier, scope, identifier)`.
///
/// "No memory yet" is a normal state: `get` returns `Ok(None)` and `list`
/// returns an empty vector for paths that were never written. Directory
/// creation is implicit in `put`/`append`.
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Replace the artifact. Readers see either the old or the new content,
    /// never a partial write.
    async fn put(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        content: &str,
    ) -> Result<(), MemoryError>;

    /// Append to a raw artifact. Other tiers reject appends.
    ///
    /// If the existing artifact ends mid-line (a write cut short by a crash),
    /// a newline is written first so the torn line cannot swallow `content`.
    async fn append(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
        content: &str,
    ) -> Result<(), MemoryError>;

    async fn get(
        &self,
        tier: Tier,
        scope: &Scope,
        identifier: &str,
    ) -> Result<Option<String>, MemoryError>;

    /// Identifiers present for the tier, newest first.
    async fn list(&self, tier: Tier, scope: &Scope) -> Result<Vec<String>, MemoryError>;

    /// Returns whether an artifact was removed.
    async fn delete(&self, tier: Tier, scope: &Scope, identifier: &str)
    -> Result<bool, MemoryError>;

    /// Every scope with at least one stored artifact.
    async fn scopes(&self) -> Result<Vec<Scope>, MemoryError>;
}

pub(crate) fn ensure_appendable(tier: Tier) -> Result<(), MemoryError> {
    if tier == Tier::Raw {
        Ok(())
    } else {
        Err(MemoryError::AppendUnsupported { tier })
    }
}

pub(crate) fn newest_first(mut identifiers: Vec<String>) -> Vec<String> {
    identifiers.sort_unstable_by(|a, b| b.cmp(a));
    identifiers.dedup();
    identifiers
}
