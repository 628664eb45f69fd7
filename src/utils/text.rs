/// Cut `s` to at most `max_chars` characters, appending `...` when cut.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}

/// Byte offset of the start of the last `max_chars` characters of `s`.
#[must_use]
pub fn tail_start(s: &str, max_chars: usize) -> usize {
    let total = s.chars().count();
    if total <= max_chars {
        return 0;
    }
    s.char_indices()
        .nth(total - max_chars)
        .map_or(s.len(), |(idx, _)| idx)
}
