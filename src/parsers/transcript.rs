use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;

use super::fields::{str_field, stringify_tool_value, text_from_content, timestamp_from_value};
use crate::models::{EventKind, SessionEvent};
use crate::utils::truncate_chars;

const MAX_CONSECUTIVE_ERRORS: usize = 100;
const MAX_TITLE_CHARS: usize = 120;

/// Events and header metadata recovered from one transcript file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTranscript {
    pub events: Vec<SessionEvent>,
    pub title: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
}

impl ParsedTranscript {
    pub fn tool_call_count(&self) -> usize {
        self.events.iter().filter(|e| e.kind == EventKind::ToolCall).count()
    }

    fn push(&mut self, mut event: SessionEvent, line: &Value) {
        event.index = self.events.len();
        event.timestamp = line.get("timestamp").and_then(timestamp_from_value);
        self.events.push(event);
    }
}

/// Parse an agent transcript (Claude or Codex JSONL)
/// Gracefully handles malformed lines by logging and skipping them
/// Returns an error if more than 50% of lines fail to parse or >100 consecutive errors
pub fn parse_transcript_file(path: &Path) -> Result<ParsedTranscript> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open transcript file: {}", path.display()))?;
    parse_transcript_reader(BufReader::new(file), &path.display().to_string())
}

/// Same as [`parse_transcript_file`] over any buffered reader; `label` names the
/// source in log lines and errors
pub fn parse_transcript_reader<R: BufRead>(reader: R, label: &str) -> Result<ParsedTranscript> {
    let mut transcript = ParsedTranscript::default();
    let mut skipped_count = 0;
    let mut total_lines = 0;
    let mut consecutive_errors = 0;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line from {}", label))?;

        if line.trim().is_empty() {
            continue;
        }

        total_lines += 1;

        let outcome = serde_json::from_str::<Value>(&line)
            .map_err(anyhow::Error::from)
            .and_then(|value| map_line(&value, &mut transcript));

        match outcome {
            Ok(()) => consecutive_errors = 0,
            Err(e) => {
                tracing::warn!(line = line_num + 1, source = label, error = %e, "skipping transcript line");
                skipped_count += 1;
                consecutive_errors += 1;

                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    bail!(
                        "Too many consecutive parse errors ({}) in {} - file may be corrupted",
                        consecutive_errors,
                        label
                    );
                }
            }
        }
    }

    if total_lines > 0 {
        let failure_rate = (skipped_count as f64) / (total_lines as f64);
        if failure_rate > 0.5 {
            bail!(
                "Too many parse failures in {}: {} of {} lines failed ({:.1}%)",
                label,
                skipped_count,
                total_lines,
                failure_rate * 100.0
            );
        }
    }

    if skipped_count > 0 {
        tracing::debug!(
            source = label,
            events = transcript.events.len(),
            skipped = skipped_count,
            "parsed transcript with skipped lines"
        );
    }

    Ok(transcript)
}

/// Map one JSON line onto the transcript; unknown line types are ignored
fn map_line(line: &Value, transcript: &mut ParsedTranscript) -> Result<()> {
    match str_field(line, "type") {
        Some(role @ ("user" | "assistant")) => map_claude_message(line, role, transcript),
        Some("summary") => {
            if let Some(summary) = str_field(line, "summary") {
                transcript.title = Some(truncate_chars(summary, MAX_TITLE_CHARS).to_string());
            }
            Ok(())
        }
        Some("system") => {
            if let Some(text) = line.get("content").and_then(text_from_content) {
                transcript.push(SessionEvent::new(EventKind::Meta, 0).with_text(text), line);
            }
            Ok(())
        }
        Some("session_meta") => {
            if let Some(cwd) = line.get("payload").and_then(|p| str_field(p, "cwd")) {
                transcript.cwd.get_or_insert_with(|| cwd.to_string());
            }
            Ok(())
        }
        Some("turn_context") => {
            if let Some(model) = line.get("payload").and_then(|p| str_field(p, "model")) {
                transcript.model.get_or_insert_with(|| model.to_string());
            }
            Ok(())
        }
        Some("response_item") => {
            let payload = line.get("payload").ok_or_else(|| anyhow!("response_item without payload"))?;
            map_codex_item(line, payload, transcript);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn map_claude_message(line: &Value, role: &str, transcript: &mut ParsedTranscript) -> Result<()> {
    let message = line.get("message").ok_or_else(|| anyhow!("{} entry without message", role))?;
    let content = message.get("content").ok_or_else(|| anyhow!("{} message without content", role))?;

    if let Some(cwd) = str_field(line, "cwd") {
        transcript.cwd.get_or_insert_with(|| cwd.to_string());
    }
    if let Some(model) = str_field(message, "model") {
        transcript.model.get_or_insert_with(|| model.to_string());
    }

    let kind = if role == "user" { EventKind::User } else { EventKind::Assistant };

    if let Some(text) = text_from_content(content) {
        if kind == EventKind::User && transcript.title.is_none() {
            transcript.title = Some(truncate_chars(text.trim(), MAX_TITLE_CHARS).to_string());
        }
        transcript.push(SessionEvent::new(kind, 0).with_text(text), line);
    }

    for block in content.as_array().into_iter().flatten() {
        match str_field(block, "type") {
            Some("tool_use") => {
                let mut event = SessionEvent::new(EventKind::ToolCall, 0);
                event.tool_name = str_field(block, "name").map(str::to_string);
                event.tool_input = block.get("input").and_then(stringify_tool_value);
                transcript.push(event, line);
            }
            Some("tool_result") => {
                let is_error = block.get("is_error").and_then(Value::as_bool).unwrap_or(false);
                let kind = if is_error { EventKind::Error } else { EventKind::ToolResult };
                let mut event = SessionEvent::new(kind, 0);
                event.tool_output = block.get("content").and_then(text_from_content);
                transcript.push(event, line);
            }
            _ => {}
        }
    }

    Ok(())
}

fn map_codex_item(line: &Value, payload: &Value, transcript: &mut ParsedTranscript) {
    match str_field(payload, "type") {
        Some("message") => {
            let kind = match str_field(payload, "role") {
                Some("user") => EventKind::User,
                Some("assistant") => EventKind::Assistant,
                _ => EventKind::Meta,
            };
            if let Some(text) = payload.get("content").and_then(text_from_content) {
                if kind == EventKind::User && transcript.title.is_none() {
                    transcript.title = Some(truncate_chars(text.trim(), MAX_TITLE_CHARS).to_string());
                }
                transcript.push(SessionEvent::new(kind, 0).with_text(text), line);
            }
        }
        Some("function_call" | "custom_tool_call") => {
            let mut event = SessionEvent::new(EventKind::ToolCall, 0);
            event.tool_name = str_field(payload, "name").map(str::to_string);
            event.tool_input = payload
                .get("arguments")
                .or_else(|| payload.get("input"))
                .and_then(stringify_tool_value);
            transcript.push(event, line);
        }
        Some("function_call_output" | "custom_tool_call_output") => {
            let mut event = SessionEvent::new(EventKind::ToolResult, 0);
            event.tool_output = payload.get("output").and_then(stringify_tool_value);
            transcript.push(event, line);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes()).expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_parse_claude_messages() {
        let content = r#"{"type":"user","cwd":"/work/app","message":{"role":"user","content":[{"type":"text","text":"Fix the login bug"}]},"timestamp":1234567890}
{"type":"assistant","message":{"role":"assistant","model":"claude-opus","content":[{"type":"text","text":"Looking now"},{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"rg login"}}]},"timestamp":"2024-01-15T10:30:00Z"}
{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"src/login.rs:12"}]}}"#;

        let file = create_test_file(content);
        let transcript = parse_transcript_file(file.path()).unwrap();

        assert_eq!(transcript.title.as_deref(), Some("Fix the login bug"));
        assert_eq!(transcript.cwd.as_deref(), Some("/work/app"));
        assert_eq!(transcript.model.as_deref(), Some("claude-opus"));

        let kinds: Vec<_> = transcript.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::User, EventKind::Assistant, EventKind::ToolCall, EventKind::ToolResult]
        );
        assert_eq!(transcript.events[2].tool_name.as_deref(), Some("Bash"));
        assert_eq!(transcript.events[2].tool_input.as_deref(), Some(r#"{"command":"rg login"}"#));
        assert_eq!(transcript.events[3].tool_output.as_deref(), Some("src/login.rs:12"));
        assert_eq!(transcript.events[3].index, 3);
        assert_eq!(transcript.tool_call_count(), 1);
    }

    #[test]
    fn test_summary_sets_title() {
        let content = r#"{"type":"user","message":{"role":"user","content":"first prompt"}}
{"type":"summary","summary":"Refactor search pipeline"}"#;
        let transcript = parse_transcript_reader(content.as_bytes(), "inline").unwrap();
        assert_eq!(transcript.title.as_deref(), Some("Refactor search pipeline"));
    }

    #[test]
    fn test_tool_error_result() {
        let content = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","is_error":true,"content":[{"type":"text","text":"permission denied"}]}]}}"#;
        let transcript = parse_transcript_reader(content.as_bytes(), "inline").unwrap();
        assert_eq!(transcript.events.len(), 1);
        assert_eq!(transcript.events[0].kind, EventKind::Error);
        assert_eq!(transcript.events[0].tool_output.as_deref(), Some("permission denied"));
    }

    #[test]
    fn test_parse_codex_items() {
        let content = r#"{"type":"session_meta","payload":{"cwd":"/repo/cortex"}}
{"type":"turn_context","payload":{"model":"gpt-5-codex"}}
{"type":"response_item","payload":{"type":"message","role":"user","content":[{"type":"input_text","text":"why does ingest stall"}]}}
{"type":"response_item","payload":{"type":"function_call","name":"shell","arguments":"{\"command\":[\"ls\"]}"}}
{"type":"response_item","payload":{"type":"function_call_output","output":"Cargo.toml\nsrc"}}
{"type":"event_msg","payload":{"type":"token_count"}}"#;

        let transcript = parse_transcript_reader(content.as_bytes(), "inline").unwrap();
        assert_eq!(transcript.cwd.as_deref(), Some("/repo/cortex"));
        assert_eq!(transcript.model.as_deref(), Some("gpt-5-codex"));
        assert_eq!(transcript.title.as_deref(), Some("why does ingest stall"));
        assert_eq!(transcript.events.len(), 3);
        assert_eq!(transcript.events[1].tool_name.as_deref(), Some("shell"));
        assert_eq!(transcript.events[2].tool_output.as_deref(), Some("Cargo.toml\nsrc"));
    }

    #[test]
    fn test_skips_malformed_lines() {
        let content = r#"{"type":"user","message":{"role":"user","content":"Valid 1"}}
invalid json line
{"type":"user","message":{"role":"user","content":"Valid 2"}}"#;
        let transcript = parse_transcript_reader(content.as_bytes(), "inline").unwrap();
        assert_eq!(transcript.events.len(), 2);
    }

    #[test]
    fn test_ignores_unknown_line_types() {
        let content = r#"{"type":"file-history-snapshot","snapshot":{}}
{"type":"user","message":{"role":"user","content":"hello"}}"#;
        let transcript = parse_transcript_reader(content.as_bytes(), "inline").unwrap();
        assert_eq!(transcript.events.len(), 1);
    }

    #[test]
    fn test_fails_with_over_50_percent_failures() {
        let content = r#"invalid line 1
{"type":"user","message":{"role":"user","content":"Valid"}}
invalid line 2
invalid line 3"#;
        let err = parse_transcript_reader(content.as_bytes(), "inline").unwrap_err();
        assert!(err.to_string().contains("Too many parse failures"));
    }

    #[test]
    fn test_fails_with_100_consecutive_errors() {
        let mut content = String::new();
        for i in 0..101 {
            content.push_str(&format!(r#"{{"type":"user","timestamp":{i}}}"#));
            content.push('\n');
        }
        let err = parse_transcript_reader(content.as_bytes(), "inline").unwrap_err();
        assert!(err.to_string().contains("Too many consecutive parse errors"));
    }

    #[test]
    fn test_nonexistent_file() {
        let err = parse_transcript_file(Path::new("/nonexistent/session.jsonl")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }

    #[test]
    fn test_empty_file() {
        let file = create_test_file("");
        let transcript = parse_transcript_file(file.path()).unwrap();
        assert!(transcript.events.is_empty());
        assert!(transcript.title.is_none());
    }
}
