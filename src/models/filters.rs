use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured predicates supplied with each search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    /// Raw query text; may still carry `repo:`/`path:` style operators
    pub query: String,
    pub model: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Repository name substring (case-insensitive)
    pub repo: Option<String>,
    /// Working directory substring (case-insensitive)
    pub path: Option<String>,
}

impl Filters {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    pub fn has_text(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// Any predicate besides free text
    pub fn has_structured(&self) -> bool {
        self.model.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
            || self.repo.is_some()
            || self.path.is_some()
    }
}

/// Which session fields take part in text matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextScope {
    All,
    ToolOutputs,
}
