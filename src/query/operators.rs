//! Operator syntax embedded in a raw query string.
//!
//! Splits `field:value` operators out of the query and leaves everything else
//! as free text.
//!
//! # Syntax
//!
//! ```text
//! query    := (operator | word)*
//! operator := field:value | field:"quoted value"
//! field    := repo | path | model | since | until   (case-insensitive)
//! ```
//!
//! Words that look like operators but use an unknown field (`http://host`), or
//! whose value does not parse (`since:yesterday`), stay in the free text. The
//! parser never fails: an unterminated quote runs to the end of the input.
//!
//! # Examples
//!
//! ```rust
//! # use agent_session_search::query::parse_operators;
//! let parsed = parse_operators("repo:agent-search flaky test since:2024-01-01");
//! assert_eq!(parsed.free_text, "flaky test");
//! assert_eq!(parsed.repo.as_deref(), Some("agent-search"));
//! assert!(parsed.since.is_some());
//! ```

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::Filters;

/// Query split into free text and structured operators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub free_text: String,
    pub repo: Option<String>,
    pub path: Option<String>,
    pub model: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ParsedQuery {
    /// Merge into caller filters; explicit filter values win over operators
    pub fn apply_to(&self, filters: &Filters) -> Filters {
        Filters {
            query: self.free_text.clone(),
            model: filters.model.clone().or_else(|| self.model.clone()),
            date_from: filters.date_from.or(self.since),
            date_to: filters.date_to.or(self.until),
            repo: filters.repo.clone().or_else(|| self.repo.clone()),
            path: filters.path.clone().or_else(|| self.path.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    FieldValue { field: String, value: String, raw: String },
    Word(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let word = read_word(&mut chars);

        if word.starts_with('"') {
            tokens.push(Token::Word(complete_quoted(&mut chars, word)));
            continue;
        }

        match word.find(':') {
            Some(colon_pos) if colon_pos > 0 => {
                let field = word[..colon_pos].to_string();
                let mut value = word[colon_pos + 1..].to_string();
                let mut raw = word.clone();

                if value.starts_with('"') {
                    let quoted = complete_quoted(&mut chars, value);
                    raw = format!("{}:{}", field, quoted);
                    value = quoted.trim_matches('"').to_string();
                }

                if value.is_empty() {
                    tokens.push(Token::Word(raw));
                } else {
                    tokens.push(Token::FieldValue { field, value, raw });
                }
            }
            _ => tokens.push(Token::Word(word)),
        }
    }

    tokens
}

fn read_word(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut word = String::new();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            break;
        }
        word.push(ch);
        chars.next();
    }

    word
}

/// Extend a word that opened a quote until the closing quote (kept in the result)
fn complete_quoted(chars: &mut std::iter::Peekable<std::str::Chars>, initial: String) -> String {
    if initial.len() > 1 && initial.ends_with('"') {
        return initial;
    }

    let mut value = initial;
    for ch in chars.by_ref() {
        value.push(ch);
        if ch == '"' {
            break;
        }
    }

    value
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// `YYYY-MM-DD` as the first second of that day (UTC)
pub fn day_start(value: &str) -> Option<DateTime<Utc>> {
    parse_date(value)?.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// `YYYY-MM-DD` as the last second of that day (UTC)
pub fn day_end(value: &str) -> Option<DateTime<Utc>> {
    parse_date(value)?.and_hms_opt(23, 59, 59).map(|dt| dt.and_utc())
}

/// Split operator syntax from free text
pub fn parse_operators(raw: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    let mut words = Vec::new();

    for token in tokenize(raw) {
        match token {
            Token::Word(word) => words.push(word),
            Token::FieldValue { field, value, raw } => {
                let applied = match field.to_lowercase().as_str() {
                    "repo" => {
                        parsed.repo = Some(value);
                        true
                    }
                    "path" => {
                        parsed.path = Some(value);
                        true
                    }
                    "model" => {
                        parsed.model = Some(value);
                        true
                    }
                    "since" => day_start(&value).map(|dt| parsed.since = Some(dt)).is_some(),
                    "until" => day_end(&value).map(|dt| parsed.until = Some(dt)).is_some(),
                    _ => false,
                };

                if !applied {
                    words.push(raw);
                }
            }
        }
    }

    parsed.free_text = words.join(" ");
    parsed
}
