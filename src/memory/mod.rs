pub mod buffer;
pub mod compaction;
pub mod period;
pub mod recorder;
pub mod render;
pub mod retrieval;
pub mod sections;
pub mod store;
pub mod tokens;
pub mod types;

pub use buffer::{DEFAULT_FLUSH_THROTTLE, IngestionBuffer};
pub use compaction::{
    CompactionEngine, CompactionReport, CompactionSettings, PeriodOutcome, PeriodStatus,
    RetentionReport,
};
pub use recorder::{MemoryRecorder, ScopeMode};
pub use render::{render_channel_context, render_server_context};
pub use retrieval::MemoryRetriever;
pub use store::{FileTierStore, InMemoryTierStore, TierStore};
pub use types::{ChannelInfo, LoadedMemory, RawEntry, RetrievalResult, Scope, Tier};

use crate::config::MemoryConfig;
use std::sync::Arc;

/// Build the tier store named by `memory.backend`. Unknown backends fall
/// back to the file store.
pub fn create_tier_store(config: &MemoryConfig) -> Arc<dyn TierStore> {
    match config.backend.as_str() {
        "file" => Arc::new(FileTierStore::new(&config.memories_path())),
        "memory" | "none" => Arc::new(InMemoryTierStore::new()),
        other => {
            tracing::warn!(backend = other, "unknown memory backend; falling back to file");
            Arc::new(FileTierStore::new(&config.memories_path()))
        }
    }
}
