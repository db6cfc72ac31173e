//! UTF-8-safe output truncation.

/// Truncate a string at the nearest char boundary at or before `max_bytes`.
#[must_use]
pub fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    s.get(..end).unwrap_or_default()
}

/// Truncate assistant-facing output to `max_chars` bytes, appending a notice.
#[must_use]
pub fn truncate_output(output: String, max_chars: usize) -> String {
    if output.len() <= max_chars {
        return output;
    }
    let mut truncated = truncate_at_char_boundary(&output, max_chars).to_string();
    truncated.push_str(&format!(
        "\n\n... (output truncated: exceeded {max_chars} character limit)"
    ));
    truncated
}
