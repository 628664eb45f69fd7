//! Render a retrieval result as the memory section of an agent prompt.

use super::types::{LoadedMemory, RetrievalResult, Tier};

fn heading(memory: &LoadedMemory) -> String {
    match memory.tier {
        Tier::Raw => format!("Today ({})", memory.identifier),
        Tier::Daily => memory.identifier.clone(),
        Tier::Weekly => format!("Week {}", memory.identifier),
        Tier::Monthly => format!("Month {}", memory.identifier),
    }
}

fn block(level: &str, memory: &LoadedMemory) -> String {
    format!("{level} {}\n{}", heading(memory), memory.content.trim())
}

fn join_blocks<'a>(level: &str, memories: impl Iterator<Item = &'a LoadedMemory>) -> String {
    memories
        .map(|memory| block(level, memory))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn finish(sections: Vec<String>) -> String {
    let mut out = sections.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Per-channel context: "Recent Memory" (raw + daily) then "Long Term
/// Memory" (weekly + monthly), in retrieval order.
pub fn render_channel_context(result: &RetrievalResult) -> String {
    let mut sections = Vec::new();
    for (title, recent) in [("Recent Memory", true), ("Long Term Memory", false)] {
        let mut memories = result
            .memories
            .iter()
            .filter(|m| m.tier.is_recent() == recent)
            .peekable();
        if memories.peek().is_some() {
            sections.push(format!("## {title}\n{}", join_blocks("###", memories)));
        }
    }
    finish(sections)
}

/// Server-wide context: same two sections, each grouped by channel with
/// `current_channel` first.
pub fn render_server_context(result: &RetrievalResult, current_channel: &str) -> String {
    let mut sections = Vec::new();
    for (title, recent) in [("Recent Memory", true), ("Long Term Memory", false)] {
        let memories: Vec<&LoadedMemory> = result
            .memories
            .iter()
            .filter(|m| m.tier.is_recent() == recent)
            .collect();
        if memories.is_empty() {
            continue;
        }

        let mut channels: Vec<&str> = Vec::new();
        for memory in &memories {
            if !channels.contains(&memory.channel_name.as_str()) {
                channels.push(&memory.channel_name);
            }
        }
        channels.sort_by_key(|name| (*name != current_channel, *name));

        let groups: Vec<String> = channels
            .into_iter()
            .map(|channel| {
                let blocks = join_blocks(
                    "####",
                    memories.iter().copied().filter(|m| m.channel_name == channel),
                );
                format!("### #{channel}\n{blocks}")
            })
            .collect();
        sections.push(format!("## {title}\n{}", groups.join("\n\n")));
    }
    finish(sections)
}
