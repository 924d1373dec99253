//! Query handling: operator extraction and full-text rewriting.

pub mod operators;
pub mod rewrite;

pub use operators::{ParsedQuery, day_end, day_start, parse_operators};
pub use rewrite::{is_explicit_fts, rewrite_query};
