use super::directory::ChannelDirectory;
use super::traits::ChannelMessage;
use crate::memory::MemoryRecorder;
use chrono::Utc;
use tokio::sync::mpsc;

/// Drain transport messages into the recorder until every sender is gone.
/// Returns how many messages were recorded.
pub async fn run_ingestion(
    mut rx: mpsc::Receiver<ChannelMessage>,
    recorder: MemoryRecorder,
    directory: &ChannelDirectory,
) -> usize {
    let mut recorded = 0;
    while let Some(message) = rx.recv().await {
        if let Some(name) = message.channel_name.as_deref() {
            directory.register(&message.channel_id, name);
        }
        let accepted = recorder.record_at(
            &message.channel_id,
            message.thread_id.as_deref(),
            &message.author,
            &message.content,
            message.timestamp.unwrap_or_else(Utc::now),
        );
        if accepted {
            recorded += 1;
        }
    }
    tracing::debug!(recorded, "ingestion loop finished");
    recorded
}
