//! Bounded search documents.
//!
//! A search document is the text a session is matched against when it has to
//! be scanned instead of looked up in the index. Field order is title, repo,
//! working directory, model, then per event: text, tool name, tool input and
//! tool output (outputs at or over the ceiling are dropped).
//!
//! Every field is capped at `per_field_chars`. When the whole session does not
//! fit in `total_chars`, the document keeps the head of the transcript and a
//! sample from its end, joined by [`ELLIPSIS`], so late matches in long
//! sessions are still found.

use crate::config::DocumentBudget;
use crate::models::Session;
use crate::utils::truncate_chars;

pub const ELLIPSIS: &str = "\n…\n";

/// Share of the total budget reserved for the tail sample (1/n)
const TAIL_SHARE_DIVISOR: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct SearchDocumentBuilder {
    budget: DocumentBudget,
}

impl SearchDocumentBuilder {
    pub fn new(budget: DocumentBudget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> &DocumentBudget {
        &self.budget
    }

    pub fn build(&self, session: &Session) -> String {
        let total = self.budget.total_chars;
        let header = self.header_pieces(session);
        let body = self.event_pieces(session);

        let mut used = 0;
        let mut header_taken = Vec::with_capacity(header.len());
        for piece in header {
            let cost = piece_cost(piece);
            if used + cost > total {
                break;
            }
            used += cost;
            header_taken.push(piece);
        }

        let body_cost: usize = body.iter().map(|p| piece_cost(p)).sum();
        if used + body_cost <= total {
            return join_pieces(header_taken.iter().chain(body.iter()).copied());
        }

        // Head gets what is left of three quarters of the budget, the tail the rest.
        let tail_reserve = total / TAIL_SHARE_DIVISOR;
        let head_limit = total.saturating_sub(tail_reserve);

        let mut head_end = 0;
        while head_end < body.len() {
            let cost = piece_cost(body[head_end]);
            if used + cost > head_limit {
                break;
            }
            used += cost;
            head_end += 1;
        }

        let mut tail_start = body.len();
        let mut tail_used = 0;
        while tail_start > head_end {
            let cost = piece_cost(body[tail_start - 1]);
            if tail_used + cost > tail_reserve {
                break;
            }
            tail_used += cost;
            tail_start -= 1;
        }

        let mut document =
            join_pieces(header_taken.iter().chain(body[..head_end].iter()).copied());
        if tail_start < body.len() {
            document.push_str(ELLIPSIS);
            document.push_str(&join_pieces(body[tail_start..].iter().copied()));
        }
        document
    }

    fn header_pieces<'a>(&self, session: &'a Session) -> Vec<&'a str> {
        [
            session.title.as_deref(),
            session.repo_name.as_deref(),
            session.effective_cwd(),
            session.model.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter_map(|field| self.cap(field))
        .collect()
    }

    fn event_pieces<'a>(&self, session: &'a Session) -> Vec<&'a str> {
        let mut pieces = Vec::new();
        for event in &session.events {
            let output = event
                .tool_output
                .as_deref()
                .filter(|out| below_ceiling(out, self.budget.tool_output_ceiling));

            for field in [
                event.text.as_deref(),
                event.tool_name.as_deref(),
                event.tool_input.as_deref(),
                output,
            ]
            .into_iter()
            .flatten()
            {
                if let Some(piece) = self.cap(field) {
                    pieces.push(piece);
                }
            }
        }
        pieces
    }

    fn cap<'a>(&self, field: &'a str) -> Option<&'a str> {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(truncate_chars(trimmed, self.budget.per_field_chars))
    }
}

impl Default for SearchDocumentBuilder {
    fn default() -> Self {
        Self::new(DocumentBudget::default())
    }
}

/// Characters a piece occupies, counting its line separator
fn piece_cost(piece: &str) -> usize {
    piece.chars().count() + 1
}

fn below_ceiling(text: &str, ceiling: usize) -> bool {
    text.len() < ceiling || text.chars().count() < ceiling
}

fn join_pieces<'a, I>(pieces: I) -> String
where
    I: Iterator<Item = &'a str>,
{
    let mut out = String::new();
    for piece in pieces {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(piece);
    }
    out
}
