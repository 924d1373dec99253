//! Free-text query rewriting for the full-text index.
//!
//! Plain input is rewritten to improve recall on the index:
//!
//! - `refactor tests` → `"refactor tests"` (exact adjacent phrase)
//! - `sess` → `sess*` (prefix match on partial identifiers)
//!
//! Input that already uses explicit full-text syntax (quotes, boolean
//! operators, a trailing `*`) is passed through untouched, so rewriting is
//! idempotent.

/// Shortest single token that gets a prefix wildcard
const MIN_PREFIX_TOKEN_LEN: usize = 3;

const BOOLEAN_OPERATORS: [&str; 4] = ["AND", "OR", "NOT", "NEAR"];

/// Whether the query already uses explicit full-text syntax
pub fn is_explicit_fts(raw: &str) -> bool {
    if raw.contains('"') {
        return true;
    }

    raw.split_whitespace()
        .any(|token| BOOLEAN_OPERATORS.contains(&token) || token.ends_with('*'))
}

/// Rewrite a free-text query into phrase or prefix form
///
/// # Examples
///
/// ```
/// use agent_session_search::query::rewrite_query;
///
/// assert_eq!(rewrite_query("refactor tests"), "\"refactor tests\"");
/// assert_eq!(rewrite_query("ses"), "ses*");
/// assert_eq!(rewrite_query("se"), "se");
/// assert_eq!(rewrite_query("foo OR bar"), "foo OR bar");
/// ```
pub fn rewrite_query(raw: &str) -> String {
    if is_explicit_fts(raw) {
        return raw.to_string();
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if trimmed.chars().any(char::is_whitespace) {
        let normalized = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
        return format!("\"{}\"", normalized);
    }

    if is_prefix_candidate(trimmed) {
        return format!("{}*", trimmed);
    }

    trimmed.to_string()
}

fn is_prefix_candidate(token: &str) -> bool {
    token.len() >= MIN_PREFIX_TOKEN_LEN
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
