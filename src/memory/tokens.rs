use crate::utils::text::tail_start;

/// Rough approximation: 4 characters per token on average.
pub const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Cut `text` down to at most `budget` tokens, keeping the newest (trailing)
/// content. The cut lands on a line boundary when the kept window contains
/// one, otherwise on a whitespace boundary, otherwise mid-word.
pub fn truncate_to_tokens(text: &str, budget: usize) -> String {
    let max_chars = budget.saturating_mul(CHARS_PER_TOKEN);
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let start = tail_start(text, max_chars);
    let window = &text[start..];

    // A window that starts exactly on a line already keeps whole lines.
    if start > 0 && text[..start].ends_with('\n') {
        return window.to_string();
    }
    if let Some(newline) = window.find('\n') {
        let rest = &window[newline + 1..];
        if !rest.is_empty() {
            return rest.to_string();
        }
    }
    if let Some(space) = window.find(char::is_whitespace) {
        let rest = window[space..].trim_start();
        if !rest.is_empty() {
            return rest.to_string();
        }
    }
    window.to_string()
}
