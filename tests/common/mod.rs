//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use agent_session_search::config::SearchConfig;
use agent_session_search::models::{EventKind, Session, SessionEvent, SessionSource};
use agent_session_search::search::{BackingIndex, IndexQuery};
use agent_session_search::store::{MemoryTranscriptCache, SessionStore, TranscriptCache};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::{Semaphore, watch};

/// Reference time every built session is dated relative to
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Config with throttling off so every unit of work is published
pub fn unthrottled_config(threshold: u64) -> SearchConfig {
    SearchConfig {
        large_session_threshold_bytes: threshold,
        throttle_ui_updates: false,
        ..SearchConfig::default()
    }
}

/// Builder for in-memory sessions
pub struct SessionBuilder {
    session: Session,
}

impl SessionBuilder {
    /// Unparsed Claude session of 1 KiB modified at [`base_time`]
    pub fn new(id: &str) -> Self {
        let mut session =
            Session::new(id, SessionSource::Claude, format!("/sessions/{id}.jsonl"), base_time());
        session.file_size_bytes = Some(1024);
        Self { session }
    }

    pub fn source(mut self, source: SessionSource) -> Self {
        self.session.source = source;
        self
    }

    pub fn size(mut self, bytes: u64) -> Self {
        self.session.file_size_bytes = Some(bytes);
        self
    }

    /// Modified `minutes` before [`base_time`]
    pub fn age_minutes(mut self, minutes: i64) -> Self {
        self.session.modified_at = base_time() - ChronoDuration::minutes(minutes);
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.session.title = Some(title.to_string());
        self
    }

    pub fn repo(mut self, repo: &str) -> Self {
        self.session.repo_name = Some(repo.to_string());
        self
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.session.cwd = Some(cwd.to_string());
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.session.model = Some(model.to_string());
        self
    }

    pub fn commands(mut self, count: usize) -> Self {
        self.session.lightweight_commands = Some(count);
        self
    }

    /// Append a user message, making the session parsed
    pub fn user(mut self, text: &str) -> Self {
        let index = self.session.events.len();
        self.session.events.push(SessionEvent::new(EventKind::User, index).with_text(text));
        self
    }

    /// Append a tool call and its output, making the session parsed
    pub fn tool(mut self, name: &str, input: &str, output: &str) -> Self {
        let index = self.session.events.len();
        self.session.events.push(SessionEvent::new(EventKind::ToolCall, index).with_tool(name, input));
        self.session.events.push(SessionEvent::new(EventKind::ToolResult, index + 1).with_output(output));
        self
    }

    pub fn build_session(self) -> Session {
        self.session
    }

    pub fn build(self) -> Arc<Session> {
        Arc::new(self.session)
    }
}

/// [`SessionStore`] serving transcripts registered up front
///
/// Sessions without a registered transcript fail to parse. A gated store
/// blocks every parse until [`FakeStore::release`] hands out permits.
pub struct FakeStore {
    transcripts: HashMap<String, Vec<SessionEvent>>,
    gate: Option<Arc<Semaphore>>,
    started: watch::Sender<Vec<String>>,
    updated: Mutex<Vec<String>>,
    caches: HashMap<SessionSource, Arc<MemoryTranscriptCache>>,
}

impl FakeStore {
    pub fn new() -> Self {
        let (started, _) = watch::channel(Vec::new());
        let caches = SessionSource::ALL
            .into_iter()
            .map(|source| (source, Arc::new(MemoryTranscriptCache::new())))
            .collect();
        Self { transcripts: HashMap::new(), gate: None, started, updated: Mutex::new(Vec::new()), caches }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn with_transcript(mut self, id: &str, text: &str) -> Self {
        self.transcripts
            .insert(id.to_string(), vec![SessionEvent::new(EventKind::User, 0).with_text(text)]);
        self
    }

    pub fn with_events(mut self, id: &str, events: Vec<SessionEvent>) -> Self {
        self.transcripts.insert(id.to_string(), events);
        self
    }

    /// Let `count` blocked or future parses through
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Ids whose parse has begun, in order
    pub fn started(&self) -> Vec<String> {
        self.started.borrow().clone()
    }

    pub async fn wait_started(&self, count: usize) {
        let mut rx = self.started.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|ids| ids.len() >= count))
            .await
            .expect("parses did not start in time")
            .expect("store dropped");
    }

    /// Ids handed back through `update_session`, in order
    pub fn updated(&self) -> Vec<String> {
        self.updated.lock().clone()
    }

    pub fn cache(&self, source: SessionSource) -> Arc<MemoryTranscriptCache> {
        Arc::clone(&self.caches[&source])
    }
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for FakeStore {
    async fn parse_full(&self, session: &Session) -> Result<Session> {
        self.started.send_modify(|ids| ids.push(session.id.clone()));

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        let Some(events) = self.transcripts.get(&session.id) else {
            bail!("no transcript for {}", session.id);
        };
        let mut parsed = session.clone();
        parsed.events = events.clone();
        Ok(parsed)
    }

    fn update_session(&self, session: Arc<Session>) {
        self.updated.lock().push(session.id.clone());
    }

    fn transcript_cache(&self, source: SessionSource) -> Option<Arc<dyn TranscriptCache>> {
        self.caches.get(&source).map(|cache| Arc::clone(cache) as Arc<dyn TranscriptCache>)
    }
}

/// Scripted [`BackingIndex`] that records every lookup
#[derive(Default)]
pub struct FakeIndex {
    pub has_data: bool,
    /// Every call fails
    pub failing: bool,
    pub indexed: HashSet<String>,
    pub fts_hits: Vec<String>,
    pub tool_io_hits: Vec<String>,
    pub prefilter_hits: Vec<String>,
    calls: Mutex<Vec<(&'static str, IndexQuery)>>,
}

impl FakeIndex {
    pub fn with_data() -> Self {
        Self { has_data: true, ..Self::default() }
    }

    /// Every lookup, including the data check, returns an error
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn indexed(mut self, ids: &[&str]) -> Self {
        self.indexed = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn fts(mut self, ids: &[&str]) -> Self {
        self.fts_hits = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn tool_io(mut self, ids: &[&str]) -> Self {
        self.tool_io_hits = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn prefilter(mut self, ids: &[&str]) -> Self {
        self.prefilter_hits = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// Names of the lookups made, in order
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|(name, _)| *name).collect()
    }

    pub fn query_for(&self, call: &str) -> Option<IndexQuery> {
        self.calls.lock().iter().find(|(name, _)| *name == call).map(|(_, query)| query.clone())
    }

    fn record(&self, call: &'static str, query: IndexQuery) -> Result<()> {
        self.calls.lock().push((call, query));
        if self.failing {
            bail!("index unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl BackingIndex for FakeIndex {
    async fn has_search_data(&self, sources: &[SessionSource]) -> Result<bool> {
        let query = IndexQuery { sources: sources.to_vec(), ..IndexQuery::default() };
        self.record("has_search_data", query)?;
        Ok(self.has_data)
    }

    async fn indexed_session_ids(&self, sources: &[SessionSource]) -> Result<HashSet<String>> {
        let query = IndexQuery { sources: sources.to_vec(), ..IndexQuery::default() };
        self.record("indexed_session_ids", query)?;
        Ok(self.indexed.clone())
    }

    async fn search_session_ids_fts(&self, query: &IndexQuery) -> Result<Vec<String>> {
        self.record("search_session_ids_fts", query.clone())?;
        Ok(self.fts_hits.clone())
    }

    async fn search_session_ids_tool_io_fts(&self, query: &IndexQuery) -> Result<Vec<String>> {
        self.record("search_session_ids_tool_io_fts", query.clone())?;
        Ok(self.tool_io_hits.clone())
    }

    async fn prefilter_session_ids(&self, query: &IndexQuery) -> Result<Vec<String>> {
        self.record("prefilter_session_ids", query.clone())?;
        Ok(self.prefilter_hits.clone())
    }
}

/// Builder for a temporary home directory holding agent session folders
pub struct HomeDirBuilder {
    temp_dir: TempDir,
}

impl HomeDirBuilder {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Add a Claude transcript under an encoded project directory
    pub fn with_claude_session(self, project: &str, id: &str, transcript: &TranscriptBuilder) -> Self {
        let dir = self.temp_dir.path().join(".claude/projects").join(project);
        fs::create_dir_all(&dir).expect("Failed to create project dir");
        fs::write(dir.join(format!("{id}.jsonl")), transcript.to_jsonl()).expect("Failed to write session");
        self
    }

    /// Add a raw Codex rollout file
    pub fn with_codex_session(self, id: &str, content: &str) -> Self {
        let dir = self.temp_dir.path().join(".codex/sessions/2025/06/01");
        fs::create_dir_all(&dir).expect("Failed to create codex dir");
        fs::write(dir.join(format!("{id}.jsonl")), content).expect("Failed to write session");
        self
    }

    pub fn session_path(&self, project: &str, id: &str) -> PathBuf {
        self.temp_dir.path().join(".claude/projects").join(project).join(format!("{id}.jsonl"))
    }

    pub fn build(self) -> TempDir {
        self.temp_dir
    }
}

impl Default for HomeDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for Claude-style JSONL transcripts
#[derive(Default)]
pub struct TranscriptBuilder {
    lines: Vec<String>,
}

impl TranscriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, text: &str) -> Self {
        self.lines.push(
            serde_json::json!({
                "type": "user",
                "timestamp": "2025-06-01T10:00:00Z",
                "message": { "role": "user", "content": text },
            })
            .to_string(),
        );
        self
    }

    pub fn assistant(mut self, text: &str) -> Self {
        self.lines.push(
            serde_json::json!({
                "type": "assistant",
                "message": {
                    "role": "assistant",
                    "model": "claude-sonnet-4",
                    "content": [{ "type": "text", "text": text }],
                },
            })
            .to_string(),
        );
        self
    }

    pub fn tool(mut self, name: &str, command: &str, output: &str) -> Self {
        self.lines.push(
            serde_json::json!({
                "type": "assistant",
                "message": {
                    "role": "assistant",
                    "content": [{ "type": "tool_use", "id": "t1", "name": name, "input": { "command": command } }],
                },
            })
            .to_string(),
        );
        self.lines.push(
            serde_json::json!({
                "type": "user",
                "message": {
                    "role": "user",
                    "content": [{ "type": "tool_result", "tool_use_id": "t1", "content": output }],
                },
            })
            .to_string(),
        );
        self
    }

    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn to_jsonl(&self) -> String {
        self.lines.join("\n")
    }
}
