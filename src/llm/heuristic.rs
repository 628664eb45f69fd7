use super::traits::{Summarizer, Summary};
use crate::memory::tokens::estimate_tokens;
use crate::utils::text::truncate_with_ellipsis;
use async_trait::async_trait;

const MAX_LINE_CHARS: usize = 200;
const MAX_DIGEST_LINES: usize = 60;

/// Offline summarizer: a deterministic digest that keeps section headers and
/// clips each content line. Used when no LLM provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicSummarizer;

impl HeuristicSummarizer {
    pub fn digest(source: &str) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut omitted = 0usize;

        for line in source.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let is_header = line.starts_with('#') || line.starts_with("< #");
            if is_header || lines.len() < MAX_DIGEST_LINES {
                lines.push(truncate_with_ellipsis(line, MAX_LINE_CHARS));
            } else {
                omitted += 1;
            }
        }

        if omitted > 0 {
            lines.push(format!("(+{omitted} more lines)"));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl Summarizer for HeuristicSummarizer {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn summarize(&self, _instruction: &str, source: &str) -> anyhow::Result<Summary> {
        let text = Self::digest(source);
        let output_tokens = estimate_tokens(&text) as u64;
        Ok(Summary::new(text, estimate_tokens(source) as u64, output_tokens))
    }
}
