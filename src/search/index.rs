//! Contract for the optional full-text index.
//!
//! The index is built and persisted elsewhere; the coordinator only queries it.
//! Implementations may be partially populated. Every call is best-effort: the
//! coordinator treats an `Err` exactly like an empty answer.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Filters, SessionSource};

/// Parameters shared by every index lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexQuery {
    pub sources: Vec<SessionSource>,
    pub model: Option<String>,
    pub repo: Option<String>,
    pub path: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Full-text expression, already rewritten; empty for structured lookups
    pub query: String,
    pub include_system_probes: bool,
    pub limit: usize,
}

impl IndexQuery {
    pub fn from_filters(sources: &[SessionSource], filters: &Filters, limit: usize) -> Self {
        Self {
            sources: sources.to_vec(),
            model: filters.model.clone(),
            repo: filters.repo.clone(),
            path: filters.path.clone(),
            date_from: filters.date_from,
            date_to: filters.date_to,
            query: String::new(),
            include_system_probes: false,
            limit,
        }
    }

    pub fn with_text(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_system_probes(mut self, include: bool) -> Self {
        self.include_system_probes = include;
        self
    }
}

#[async_trait]
pub trait BackingIndex: Send + Sync {
    /// Whether any searchable content exists for these sources
    async fn has_search_data(&self, sources: &[SessionSource]) -> Result<bool>;

    /// Ids of sessions whose content has been indexed
    async fn indexed_session_ids(&self, sources: &[SessionSource]) -> Result<HashSet<String>>;

    /// Full-text search over indexed session text, best match first
    async fn search_session_ids_fts(&self, query: &IndexQuery) -> Result<Vec<String>>;

    /// Full-text search restricted to recent tool input/output text
    async fn search_session_ids_tool_io_fts(&self, query: &IndexQuery) -> Result<Vec<String>>;

    /// Structured-only lookup, ignores `query.query`
    async fn prefilter_session_ids(&self, query: &IndexQuery) -> Result<Vec<String>>;
}
