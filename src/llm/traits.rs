use async_trait::async_trait;

/// Text returned by a summarizer plus the token usage it reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Summary {
    pub fn new(text: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            text: text.into(),
            input_tokens,
            output_tokens,
        }
    }
}

/// External text summarizer. Turns source text into shorter text.
///
/// Compaction treats this as a black box: it wraps every call in a timeout
/// and falls back to the source text when the call errors or returns nothing.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Provider name for logs and usage records.
    fn name(&self) -> &str;

    /// Model identifier used for cost estimation. Empty when not applicable.
    fn model(&self) -> &str {
        ""
    }

    async fn summarize(&self, instruction: &str, source: &str) -> anyhow::Result<Summary>;
}
