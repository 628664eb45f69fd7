//! Summarizer instructions and source assembly for each tier.

use crate::memory::types::RawEntry;

pub const DAILY_INSTRUCTION: &str = "You keep the long-term memory of a chat channel. \
Summarize the day's conversation log into short notes. Keep outcomes, decisions, \
stated preferences and commitments, attributed to the people involved. \
Omit greetings, small talk and noise. Reply with the notes only.";

pub const WEEKLY_INSTRUCTION: &str = "You keep the long-term memory of a chat channel. \
Condense the daily notes below into one summary of the week. Keep decisions, \
preferences and ongoing threads that still matter; drop anything superseded later \
in the week. Reply with the summary only.";

pub const MONTHLY_INSTRUCTION: &str = "You keep the long-term memory of a chat channel. \
Condense the weekly summaries below into one summary of the month. Keep durable \
facts, decisions and preferences; drop transient detail. Reply with the summary only.";

/// Raw entries as one line each, oldest first.
pub fn raw_source(entries: &[&RawEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.render_line())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `## <prefix><label>` sections, one per source artifact, in the given order.
pub fn sectioned_source(prefix: &str, items: &[(String, String)]) -> String {
    items
        .iter()
        .map(|(label, body)| format!("## {prefix}{label}\n{}", body.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
