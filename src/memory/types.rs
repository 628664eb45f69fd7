use crate::error::MemoryError;
use crate::memory::period;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Directory name of the server-wide scope.
pub const SERVER_SCOPE: &str = "all";

/// Granularity of a stored memory artifact, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Raw,
    Daily,
    Weekly,
    Monthly,
}

impl Tier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Raw => "jsonl",
            Self::Daily | Self::Weekly | Self::Monthly => "md",
        }
    }

    /// The tier this one compacts into.
    pub const fn coarser(self) -> Option<Tier> {
        match self {
            Self::Raw => Some(Self::Daily),
            Self::Daily => Some(Self::Weekly),
            Self::Weekly => Some(Self::Monthly),
            Self::Monthly => None,
        }
    }

    /// Raw and daily artifacts render as recent memory; weekly and monthly as long-term.
    pub const fn is_recent(self) -> bool {
        matches!(self, Self::Raw | Self::Daily)
    }

    pub fn validate_identifier(self, identifier: &str) -> Result<(), MemoryError> {
        let valid = match self {
            Self::Raw | Self::Daily => period::parse_date_id(identifier).is_some(),
            Self::Weekly => period::parse_week_id(identifier).is_some(),
            Self::Monthly => period::parse_month_id(identifier).is_some(),
        };
        if valid {
            Ok(())
        } else {
            Err(MemoryError::InvalidIdentifier {
                tier: self,
                identifier: identifier.to_string(),
            })
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("unknown memory tier: {other}")),
        }
    }
}

/// Memory namespace: one channel, or the whole server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Channel(String),
    Server,
}

impl Scope {
    /// Parse an externally supplied scope. Rejects anything that is not a
    /// single, non-hidden path segment.
    pub fn parse(raw: &str) -> Result<Self, MemoryError> {
        let raw = raw.trim();
        if raw == SERVER_SCOPE {
            return Ok(Self::Server);
        }
        let safe = !raw.is_empty()
            && !raw.starts_with('.')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
        if safe {
            Ok(Self::Channel(raw.to_string()))
        } else {
            Err(MemoryError::InvalidScope(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Channel(id) => id,
            Self::Server => SERVER_SCOPE,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A known channel: its id (the scope) and its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

impl ChannelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One captured chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    pub timestamp: DateTime<Utc>,
    pub channel_id: String,
    pub channel_name: String,
    pub author: String,
    pub text: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl RawEntry {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// `[HH:MM] author: text`, one line per entry.
    pub fn render_line(&self) -> String {
        let text = self.text.trim().replace(['\r', '\n'], " ");
        match &self.thread_id {
            Some(thread) => format!(
                "[{}] {} (thread {thread}): {text}",
                self.timestamp.format("%H:%M"),
                self.author
            ),
            None => format!("[{}] {}: {text}", self.timestamp.format("%H:%M"), self.author),
        }
    }
}

/// Serialize entries as JSON lines, newline-terminated.
pub fn encode_jsonl(entries: &[RawEntry]) -> Result<String, MemoryError> {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parse JSON lines, skipping lines that do not decode (a torn final line
/// after a crash must not cost the whole day).
pub fn decode_jsonl(raw: &str) -> Vec<RawEntry> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str::<RawEntry>(line) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(
                    line = idx + 1,
                    error = %error,
                    "skipping malformed raw memory line"
                );
                None
            }
        })
        .collect()
}

/// One item selected by budgeted retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedMemory {
    #[serde(rename = "type")]
    pub tier: Tier,
    pub identifier: String,
    pub channel_name: String,
    pub content: String,
    pub token_count: usize,
}

/// Output of one retrieval call. Built fresh per call, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub memories: Vec<LoadedMemory>,
    pub total_tokens: usize,
    pub budget_used: f64,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}
