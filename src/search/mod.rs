//! Multi-tier session search.
//!
//! - [`SearchCoordinator`] - Runs searches, publishes [`SearchState`]
//! - [`SearchDocumentBuilder`] - Bounded text surface of one session
//! - [`partition_by_size`] - Small/large tiers ordered by recency
//! - [`FilterMatcher`] / [`DefaultMatcher`] - Per-session predicate evaluation
//! - [`BackingIndex`] - Optional full-text index contract
//! - [`Prewarmer`] - Background transcript cache filling

pub mod coordinator;
pub mod document;
pub mod index;
pub mod matcher;
pub mod partition;
pub mod prewarm;
pub mod promotion;
pub mod state;
pub mod throttle;
pub mod transcript;

pub use coordinator::{SearchCoordinator, SearchRequest};
pub use document::SearchDocumentBuilder;
pub use index::{BackingIndex, IndexQuery};
pub use matcher::{DefaultMatcher, FilterMatcher};
pub use partition::{Tiers, effective_size, partition_by_size};
pub use prewarm::{PrewarmSkip, Prewarmer};
pub use promotion::PromotionSlot;
pub use state::{Generation, SearchState, StateHandle};
pub use transcript::render_transcript;
