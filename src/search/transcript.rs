//! Plain-text transcript rendering used to fill transcript caches.

use std::fmt::Write;

use crate::models::{EventKind, Session};

/// Renders every event of a parsed session as labelled plain text
pub fn render_transcript(session: &Session) -> String {
    let mut out = String::new();

    for event in &session.events {
        let label = match event.kind {
            EventKind::User => "user",
            EventKind::Assistant => "assistant",
            EventKind::ToolCall => "tool",
            EventKind::ToolResult => "output",
            EventKind::Error => "error",
            EventKind::Meta => "meta",
        };

        if let Some(text) = event.text.as_deref() {
            let _ = writeln!(out, "[{label}] {text}");
        }
        if let Some(name) = event.tool_name.as_deref() {
            let input = event.tool_input.as_deref().unwrap_or_default();
            let _ = writeln!(out, "[{label}] {name} {input}");
        }
        if let Some(output) = event.tool_output.as_deref() {
            let _ = writeln!(out, "[{label}] {output}");
        }
    }

    out
}
