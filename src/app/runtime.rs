use crate::channels::ChannelDirectory;
use crate::config::Config;
use crate::llm::{Summarizer, create_summarizer};
use crate::memory::compaction::{CompactionEngine, CompactionSettings};
use crate::memory::store::TierStore;
use crate::memory::types::{ChannelInfo, Scope};
use crate::memory::{IngestionBuffer, MemoryRecorder, MemoryRetriever, create_tier_store};
use crate::usage::{NoopUsageTracker, SqliteUsageTracker, UsageTracker};
use std::sync::Arc;

/// Every memory component wired from one config.
pub struct MemoryRuntime {
    pub config: Config,
    pub store: Arc<dyn TierStore>,
    pub buffer: IngestionBuffer,
    pub directory: Arc<ChannelDirectory>,
    pub recorder: MemoryRecorder,
    pub retriever: MemoryRetriever,
    pub engine: Arc<CompactionEngine>,
    pub usage: Arc<dyn UsageTracker>,
}

impl MemoryRuntime {
    pub async fn from_config(config: Config) -> Self {
        for problem in config.misconfigurations() {
            tracing::warn!("config: {problem}");
        }

        let store = create_tier_store(&config.memory);
        let summarizer =
            create_summarizer(&config.summarizer, config.memory.summarizer_timeout_secs);
        let usage = open_usage_tracker(&config).await;
        Self::from_parts(config, store, summarizer, usage)
    }

    /// Wire the runtime around explicit collaborators.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn TierStore>,
        summarizer: Arc<dyn Summarizer>,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        let buffer = IngestionBuffer::new(store.clone(), config.memory.flush_throttle());
        let directory = Arc::new(ChannelDirectory::new(&config.channels));
        let mode = config.memory.scope_mode();
        let recorder = MemoryRecorder::new(buffer.clone(), directory.clone(), mode);
        let retriever =
            MemoryRetriever::new(store.clone(), Some(buffer.clone()), directory.clone());

        let settings = CompactionSettings {
            mode,
            retention_months: config.memory.retention_months,
            summarizer_timeout: config.memory.summarizer_timeout(),
        };
        let engine = CompactionEngine::new(store.clone(), summarizer, settings)
            .with_buffer(buffer.clone())
            .with_usage_tracker(usage.clone());

        Self {
            config,
            store,
            buffer,
            directory,
            recorder,
            retriever,
            engine: Arc::new(engine),
            usage,
        }
    }

    /// Make channels that only exist on disk known to the directory, then
    /// return every known channel.
    pub async fn discover_channels(&self) -> Vec<ChannelInfo> {
        match self.store.scopes().await {
            Ok(scopes) => {
                for scope in scopes {
                    if let Scope::Channel(id) = scope {
                        self.directory.ensure_known(&id);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(
                    store = self.store.name(),
                    error = %error,
                    "failed to list stored scopes"
                );
            }
        }
        self.directory.channels()
    }
}

async fn open_usage_tracker(config: &Config) -> Arc<dyn UsageTracker> {
    let Some(path) = config.memory.usage_db_path() else {
        return Arc::new(NoopUsageTracker);
    };
    match SqliteUsageTracker::open(&path).await {
        Ok(tracker) => Arc::new(tracker),
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "usage tracking disabled");
            Arc::new(NoopUsageTracker)
        }
    }
}
