use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A message delivered by a chat transport.
///
/// `channel_id` identifies the chat channel (e.g. a Discord channel ID);
/// `thread_id` is set for replies inside a thread of that channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: Option<String>,
    pub author: String,
    #[serde(alias = "text")]
    pub content: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Chat transport: delivers incoming messages until it runs dry or fails.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Start listening for incoming messages (long-running)
    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()>;
}
