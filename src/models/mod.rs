//! Data models for agent session search.
//!
//! - [`Session`] / [`SessionEvent`] - One agent transcript and its entries
//! - [`Filters`] / [`TextScope`] - Per-search predicates and match scope
//! - [`Progress`] / [`SearchPhase`] - Published scan progress

pub mod filters;
pub mod progress;
pub mod session;

pub use filters::{Filters, TextScope};
pub use progress::{Progress, SearchPhase};
pub use session::{EventKind, Session, SessionEvent, SessionSource};
