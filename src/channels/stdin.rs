use super::traits::{ChannelMessage, Transport};
use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Reads one JSON message per line from stdin, e.g.
/// `{"channelId":"100","channelName":"general","author":"ana","content":"hi"}`.
///
/// A bridge process in front of the chat gateway pipes messages in; the
/// transport finishes when stdin closes.
pub struct StdinTransport;

#[async_trait::async_trait]
impl Transport for StdinTransport {
    fn name(&self) -> &str {
        "stdin"
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> Result<()> {
        let forwarded = forward_json_lines(BufReader::new(tokio::io::stdin()), &tx).await?;
        tracing::info!(forwarded, "stdin closed");
        Ok(())
    }
}

/// Forward every parseable line of `reader` to `tx`. Malformed lines are
/// logged and skipped. Returns the number of messages forwarded.
pub async fn forward_json_lines<R>(reader: R, tx: &mpsc::Sender<ChannelMessage>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    let mut line_no = 0_usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ChannelMessage>(line) {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    tracing::debug!("ingestion receiver dropped; stopping transport");
                    break;
                }
                forwarded += 1;
            }
            Err(error) => {
                tracing::warn!(
                    line = line_no,
                    error = %error,
                    "skipping malformed message"
                );
            }
        }
    }
    Ok(forwarded)
}
