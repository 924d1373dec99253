use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::TranscriptCache;

/// In-memory [`TranscriptCache`]
#[derive(Debug, Default)]
pub struct MemoryTranscriptCache {
    entries: RwLock<HashMap<String, Arc<str>>>,
}

impl MemoryTranscriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl TranscriptCache for MemoryTranscriptCache {
    fn get(&self, session_id: &str) -> Option<Arc<str>> {
        self.entries.read().get(session_id).cloned()
    }

    fn insert(&self, session_id: &str, transcript: Arc<str>) {
        self.entries.write().insert(session_id.to_string(), transcript);
    }

    fn contains(&self, session_id: &str) -> bool {
        self.entries.read().contains_key(session_id)
    }
}
