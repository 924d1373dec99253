//! Terminal-safe rendering of transcript text.
//!
//! Titles and snippets come straight from agent logs and may carry ANSI escape
//! sequences or control characters. Anything printed by the CLI goes through
//! [`sanitize_line`].

use super::text::truncate_chars;

/// Strips ANSI CSI sequences and control characters other than tab/newline/CR
///
/// ```
/// use agent_session_search::utils::terminal::strip_ansi_codes;
///
/// assert_eq!(strip_ansi_codes("\x1b[31mRed\x1b[0m text"), "Red text");
/// ```
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }

        if ch.is_control() && !matches!(ch, '\t' | '\n' | '\r') {
            continue;
        }

        result.push(ch);
    }

    result
}

/// Single-line, escape-free, length-bounded form of `text`
pub fn sanitize_line(text: &str, max_chars: usize) -> String {
    let stripped = strip_ansi_codes(text);
    let flat = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if flat.chars().count() <= max_chars {
        return flat;
    }

    let mut cut = truncate_chars(&flat, max_chars.saturating_sub(1)).to_string();
    cut.push('…');
    cut
}
