//! Session-level filter evaluation.
//!
//! [`FilterMatcher`] is the contract the coordinator scans with.
//! [`DefaultMatcher`] evaluates structured predicates against session
//! metadata and free text against a bounded search document:
//!
//! - Structured predicates are AND'd: model, repo and path are
//!   case-insensitive substring matches, dates bound `modified_at`.
//! - Free text is split into terms (quoted phrases stay whole, trailing `*` and
//!   boolean keywords are dropped); every term must appear.

use std::sync::Arc;

use crate::config::DocumentBudget;
use crate::models::{Filters, Session, TextScope};
use crate::query::{ParsedQuery, parse_operators};
use crate::search::document::SearchDocumentBuilder;
use crate::search::transcript::render_transcript;
use crate::store::TranscriptCache;
use crate::utils::{contains_ignore_case, truncate_chars};

const BOOLEAN_KEYWORDS: [&str; 4] = ["AND", "OR", "NOT", "NEAR"];

pub trait FilterMatcher: Send + Sync {
    /// Whether `session` satisfies `filters`, matching text within `scope`
    ///
    /// With `allow_transcript_generation`, a parsed session missing from
    /// `cache` gets its rendered transcript inserted.
    fn session_matches(
        &self,
        session: &Session,
        filters: &Filters,
        cache: Option<&dyn TranscriptCache>,
        allow_transcript_generation: bool,
        scope: TextScope,
    ) -> bool;

    fn filter_sessions(
        &self,
        sessions: &[Arc<Session>],
        filters: &Filters,
        cache: Option<&dyn TranscriptCache>,
        allow_transcript_generation: bool,
    ) -> Vec<Arc<Session>> {
        sessions
            .iter()
            .filter(|session| {
                self.session_matches(
                    session,
                    filters,
                    cache,
                    allow_transcript_generation,
                    TextScope::All,
                )
            })
            .cloned()
            .collect()
    }

    fn parse_operators(&self, raw: &str) -> ParsedQuery {
        parse_operators(raw)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMatcher {
    builder: SearchDocumentBuilder,
}

impl DefaultMatcher {
    pub fn new(budget: DocumentBudget) -> Self {
        Self { builder: SearchDocumentBuilder::new(budget) }
    }

    fn haystack(
        &self,
        session: &Session,
        cache: Option<&dyn TranscriptCache>,
        allow_transcript_generation: bool,
        scope: TextScope,
    ) -> String {
        match scope {
            TextScope::All => {
                let mut doc = self.builder.build(session);

                if session.is_parsed() {
                    if allow_transcript_generation
                        && let Some(cache) = cache
                        && !cache.contains(&session.id)
                    {
                        cache.insert(&session.id, Arc::from(render_transcript(session)));
                    }
                } else if let Some(text) = cache.and_then(|c| c.get(&session.id)) {
                    doc.push('\n');
                    doc.push_str(truncate_chars(&text, self.builder.budget().total_chars));
                }

                doc
            }
            TextScope::ToolOutputs => {
                let budget = self.builder.budget().total_chars;
                let mut doc = String::new();
                for output in session.events.iter().filter_map(|e| e.tool_output.as_deref()) {
                    let remaining = budget.saturating_sub(doc.chars().count());
                    if remaining == 0 {
                        break;
                    }
                    doc.push_str(truncate_chars(output, remaining));
                    doc.push('\n');
                }
                doc
            }
        }
    }
}

impl FilterMatcher for DefaultMatcher {
    fn session_matches(
        &self,
        session: &Session,
        filters: &Filters,
        cache: Option<&dyn TranscriptCache>,
        allow_transcript_generation: bool,
        scope: TextScope,
    ) -> bool {
        if !matches_structured(session, filters) {
            return false;
        }

        let terms = query_terms(&filters.query);
        if terms.is_empty() {
            return true;
        }

        // Terms are whitespace-normalized, so the haystack must be too
        let haystack = self
            .haystack(session, cache, allow_transcript_generation, scope)
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        terms.iter().all(|term| haystack.contains(term.as_str()))
    }
}

/// All structured predicates in `filters` hold for `session`
pub fn matches_structured(session: &Session, filters: &Filters) -> bool {
    if let Some(model) = filters.model.as_deref()
        && !session.model.as_deref().is_some_and(|m| contains_ignore_case(m, model))
    {
        return false;
    }

    if let Some(repo) = filters.repo.as_deref() {
        let repo_name = session.repo_name.as_deref().or(session.effective_cwd());
        if !repo_name.is_some_and(|name| contains_ignore_case(name, repo)) {
            return false;
        }
    }

    if let Some(path) = filters.path.as_deref()
        && !session.effective_cwd().is_some_and(|cwd| match_path(cwd, path))
    {
        return false;
    }

    if filters.date_from.is_some_and(|from| session.modified_at < from) {
        return false;
    }

    if filters.date_to.is_some_and(|to| session.modified_at > to) {
        return false;
    }

    true
}

/// Case-insensitive substring match with leading `~` expanded to the home directory
fn match_path(cwd: &str, value: &str) -> bool {
    let lower_value = value.to_lowercase();
    let search_value = match (lower_value.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}{}", home.to_string_lossy().to_lowercase(), rest),
        _ => lower_value,
    };
    cwd.to_lowercase().contains(&search_value)
}

/// Lowercased match terms of a free-text query
fn query_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut rest = query.trim();

    while !rest.is_empty() {
        if let Some(after_quote) = rest.strip_prefix('"') {
            let (phrase, remainder) = match after_quote.find('"') {
                Some(end) => (&after_quote[..end], &after_quote[end + 1..]),
                None => (after_quote, ""),
            };
            let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
            if !phrase.is_empty() {
                terms.push(phrase.to_lowercase());
            }
            rest = remainder.trim_start();
            continue;
        }

        let end = rest.find(|c: char| c.is_whitespace() || c == '"').unwrap_or(rest.len());
        let word = &rest[..end];
        rest = rest[end..].trim_start();

        if BOOLEAN_KEYWORDS.contains(&word) {
            continue;
        }
        let word = word.trim_end_matches('*');
        if !word.is_empty() {
            terms.push(word.to_lowercase());
        }
    }

    terms
}
