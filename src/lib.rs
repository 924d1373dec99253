//! Agent Session Search - Find things in AI coding-agent transcripts
//!
//! This library searches the local session logs written by agent CLIs
//! (Claude, Codex, Gemini and others). It supports:
//!
//! - Discovering session files and parsing JSONL transcripts
//! - Rewriting free-text queries for a full-text index
//! - Building bounded search documents for brute-force matching
//! - A cancellable search coordinator that prefers an index and falls back to
//!   tiered scanning, publishing results progressively
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agent_session_search::models::Filters;
//! use agent_session_search::search::{DefaultMatcher, SearchCoordinator, SearchRequest};
//! use agent_session_search::store::{JsonlSessionStore, discover_sessions};
//! use agent_session_search::SearchConfig;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let home = std::path::PathBuf::from("/Users/alice");
//! let sessions = discover_sessions(&home)?.into_iter().map(Arc::new).collect();
//!
//! let coordinator = SearchCoordinator::new(
//!     SearchConfig::default(),
//!     Arc::new(JsonlSessionStore::new()),
//!     None,
//!     Arc::new(DefaultMatcher::default()),
//! );
//! coordinator.start(SearchRequest::new(Filters::with_query("flaky test"), sessions)).await?;
//! println!("{} matches", coordinator.snapshot().results.len());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod models;
pub mod parsers;
pub mod query;
pub mod search;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::{DocumentBudget, SearchConfig};
pub use models::{Filters, Progress, SearchPhase, Session, SessionSource};
pub use query::rewrite_query;
pub use search::{SearchCoordinator, SearchRequest, SearchState};
