//! Multi-channel artifact layout.
//!
//! Server-wide summaries hold one section per channel, each introduced by a
//! `< #channel-name >` delimiter line. Per-channel summaries are a single
//! untitled section.

/// One channel's slice of a summary artifact. `channel` is `None` for text
/// outside any delimiter (per-channel artifacts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub channel: Option<String>,
    pub body: String,
}

impl Section {
    pub fn untitled(body: impl Into<String>) -> Self {
        Self {
            channel: None,
            body: body.into(),
        }
    }

    pub fn for_channel(channel: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            body: body.into(),
        }
    }
}

pub fn delimiter(channel: &str) -> String {
    format!("< #{channel} >")
}

fn parse_delimiter(line: &str) -> Option<&str> {
    let inner = line.trim().strip_prefix("< #")?.strip_suffix('>')?;
    let name = inner.trim();
    (!name.is_empty()).then_some(name)
}

pub fn render_sections(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        if let Some(channel) = &section.channel {
            out.push_str(&delimiter(channel));
            out.push('\n');
        }
        out.push_str(section.body.trim());
    }
    out
}

pub fn parse_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section::untitled(String::new());

    for line in content.lines() {
        if let Some(name) = parse_delimiter(line) {
            push_non_empty(&mut sections, current);
            current = Section::for_channel(name, String::new());
            continue;
        }
        if !current.body.is_empty() {
            current.body.push('\n');
        }
        current.body.push_str(line);
    }
    push_non_empty(&mut sections, current);
    sections
}

fn push_non_empty(sections: &mut Vec<Section>, mut section: Section) {
    section.body = section.body.trim().to_string();
    if !section.body.is_empty() {
        sections.push(section);
    }
}
