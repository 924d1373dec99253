use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent CLI that produced a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Claude,
    Codex,
    Gemini,
    OpenCode,
    Copilot,
    Droid,
}

impl SessionSource {
    pub const ALL: [SessionSource; 6] = [
        SessionSource::Claude,
        SessionSource::Codex,
        SessionSource::Gemini,
        SessionSource::OpenCode,
        SessionSource::Copilot,
        SessionSource::Droid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionSource::Claude => "claude",
            SessionSource::Codex => "codex",
            SessionSource::Gemini => "gemini",
            SessionSource::OpenCode => "opencode",
            SessionSource::Copilot => "copilot",
            SessionSource::Droid => "droid",
        }
    }
}

impl fmt::Display for SessionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(SessionSource::Claude),
            "codex" => Ok(SessionSource::Codex),
            "gemini" => Ok(SessionSource::Gemini),
            "opencode" => Ok(SessionSource::OpenCode),
            "copilot" => Ok(SessionSource::Copilot),
            "droid" => Ok(SessionSource::Droid),
            _ => Err(anyhow!(
                "Unknown source: '{}' (valid sources: claude, codex, gemini, opencode, copilot, droid)",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    User,
    Assistant,
    ToolCall,
    ToolResult,
    Error,
    Meta,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub index: usize,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<String>,
    #[serde(default)]
    pub tool_output: Option<String>,
}

impl SessionEvent {
    pub fn new(kind: EventKind, index: usize) -> Self {
        Self {
            kind,
            index,
            timestamp: None,
            text: None,
            tool_name: None,
            tool_input: None,
            tool_output: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_tool(mut self, name: impl Into<String>, input: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self.tool_input = Some(input.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.tool_output = Some(output.into());
        self
    }
}

/// A recorded agent transcript
///
/// Discovery fills in identity, size and recency plus the lightweight hints.
/// `events` stays empty until a full parse; the search pipeline never mutates a
/// shared session, it hands an enriched copy back to the store instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub source: SessionSource,
    pub file_path: PathBuf,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub repo_name: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub lightweight_cwd: Option<String>,
    #[serde(default)]
    pub lightweight_commands: Option<usize>,
    #[serde(default)]
    pub events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        source: SessionSource,
        file_path: impl Into<PathBuf>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            file_path: file_path.into(),
            file_size_bytes: None,
            modified_at,
            title: None,
            repo_name: None,
            cwd: None,
            model: None,
            lightweight_cwd: None,
            lightweight_commands: None,
            events: Vec::new(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        !self.events.is_empty()
    }

    /// Working directory, preferring parsed data over the discovery hint
    pub fn effective_cwd(&self) -> Option<&str> {
        self.cwd.as_deref().or(self.lightweight_cwd.as_deref())
    }

    /// Whether the cheap pre-scan saw tool commands in this session
    pub fn hints_tool_output(&self) -> bool {
        self.lightweight_commands.is_some_and(|n| n > 0)
    }
}
