use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{MemoryTranscriptCache, SessionStore, TranscriptCache};
use crate::models::{Session, SessionSource};
use crate::parsers::{ParsedTranscript, parse_transcript_file};
use crate::utils::repo_name_from_cwd;

/// [`SessionStore`] that parses transcripts from their JSONL files
///
/// Parsed sessions handed back through `update_session` are kept in memory;
/// one [`MemoryTranscriptCache`] is kept per agent source.
pub struct JsonlSessionStore {
    caches: HashMap<SessionSource, Arc<MemoryTranscriptCache>>,
    parsed: RwLock<HashMap<String, Arc<Session>>>,
}

impl JsonlSessionStore {
    pub fn new() -> Self {
        let caches = SessionSource::ALL
            .into_iter()
            .map(|source| (source, Arc::new(MemoryTranscriptCache::new())))
            .collect();
        Self { caches, parsed: RwLock::new(HashMap::new()) }
    }

    pub fn parsed_session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.parsed.read().get(session_id).cloned()
    }

    pub fn parsed_count(&self) -> usize {
        self.parsed.read().len()
    }
}

impl Default for JsonlSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for JsonlSessionStore {
    async fn parse_full(&self, session: &Session) -> Result<Session> {
        let path = session.file_path.clone();
        let transcript = tokio::task::spawn_blocking(move || parse_transcript_file(&path))
            .await
            .context("Transcript parse task failed")??;
        Ok(enrich_session(session, transcript))
    }

    fn update_session(&self, session: Arc<Session>) {
        self.parsed.write().insert(session.id.clone(), session);
    }

    fn transcript_cache(&self, source: SessionSource) -> Option<Arc<dyn TranscriptCache>> {
        self.caches.get(&source).map(|cache| Arc::clone(cache) as Arc<dyn TranscriptCache>)
    }
}

/// Copy of `session` carrying the parsed events; discovery metadata wins over parsed metadata
pub fn enrich_session(session: &Session, transcript: ParsedTranscript) -> Session {
    let mut enriched = session.clone();
    enriched.lightweight_commands = Some(transcript.tool_call_count());
    enriched.title = enriched.title.or(transcript.title);
    enriched.model = enriched.model.or(transcript.model);
    enriched.cwd = enriched.cwd.or(transcript.cwd);
    if enriched.repo_name.is_none() {
        enriched.repo_name = enriched.effective_cwd().and_then(repo_name_from_cwd);
    }
    enriched.events = transcript.events;
    enriched
}
