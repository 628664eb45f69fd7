use super::buffer::IngestionBuffer;
use super::types::{RawEntry, Scope};
use crate::channels::ChannelDirectory;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Where incoming messages are filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// One memory namespace per channel.
    PerChannel,
    /// One shared namespace (`all`) for the whole server.
    ServerWide,
}

impl ScopeMode {
    pub fn from_server_wide(server_wide: bool) -> Self {
        if server_wide {
            Self::ServerWide
        } else {
            Self::PerChannel
        }
    }
}

/// Ingestion entry point for chat transports. Turns `(channel, author, text)`
/// tuples into raw entries and hands them to the buffer.
#[derive(Clone)]
pub struct MemoryRecorder {
    buffer: IngestionBuffer,
    directory: Arc<ChannelDirectory>,
    mode: ScopeMode,
}

impl MemoryRecorder {
    pub fn new(buffer: IngestionBuffer, directory: Arc<ChannelDirectory>, mode: ScopeMode) -> Self {
        Self {
            buffer,
            directory,
            mode,
        }
    }

    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    pub fn buffer(&self) -> &IngestionBuffer {
        &self.buffer
    }

    pub fn record_channel_message(&self, channel_id: &str, author: &str, text: &str) -> bool {
        self.record_at(channel_id, None, author, text, Utc::now())
    }

    pub fn record_thread_reply(
        &self,
        channel_id: &str,
        thread_id: &str,
        author: &str,
        text: &str,
    ) -> bool {
        self.record_at(channel_id, Some(thread_id), author, text, Utc::now())
    }

    /// Record one message with an explicit timestamp. Returns `false` when
    /// the message was dropped (blank text or an unusable channel id).
    pub fn record_at(
        &self,
        channel_id: &str,
        thread_id: Option<&str>,
        author: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> bool {
        if text.trim().is_empty() {
            tracing::debug!(channel_id, "ignoring empty message");
            return false;
        }
        let Some(scope) = self.scope_for(channel_id) else {
            return false;
        };

        let entry = RawEntry {
            timestamp,
            channel_id: channel_id.to_string(),
            channel_name: self.directory.name_for(channel_id),
            author: author.trim().to_string(),
            text: text.to_string(),
            session_id: self.buffer.session_id().to_string(),
            thread_id: thread_id
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        };
        self.buffer.record(scope, entry);
        true
    }

    fn scope_for(&self, channel_id: &str) -> Option<Scope> {
        // The channel id is validated in both modes: it lands in every entry.
        match Scope::parse(channel_id) {
            Ok(Scope::Channel(id)) => Some(match self.mode {
                ScopeMode::PerChannel => Scope::Channel(id),
                ScopeMode::ServerWide => Scope::Server,
            }),
            Ok(Scope::Server) | Err(_) => {
                tracing::warn!(channel_id, "dropping message with unusable channel id");
                None
            }
        }
    }
}
