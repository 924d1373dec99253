//! Session store contracts and a JSONL-backed implementation.
//!
//! The search pipeline only talks to [`SessionStore`] and [`TranscriptCache`];
//! [`JsonlSessionStore`] is the concrete store used by the CLI.

pub mod cache;
pub mod discovery;
pub mod jsonl;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Session, SessionSource};

pub use cache::MemoryTranscriptCache;
pub use discovery::discover_sessions;
pub use jsonl::JsonlSessionStore;

/// Owner of session persistence and full parsing
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns a copy of `session` with `events` populated
    async fn parse_full(&self, session: &Session) -> Result<Session>;

    /// Persist a freshly parsed session; fire-and-forget
    fn update_session(&self, session: Arc<Session>);

    /// Rendered-transcript cache for one agent source, if the store keeps one
    fn transcript_cache(&self, source: SessionSource) -> Option<Arc<dyn TranscriptCache>>;
}

/// Rendered transcript text keyed by session id
pub trait TranscriptCache: Send + Sync {
    fn get(&self, session_id: &str) -> Option<Arc<str>>;

    fn insert(&self, session_id: &str, transcript: Arc<str>);

    fn contains(&self, session_id: &str) -> bool {
        self.get(session_id).is_some()
    }
}
