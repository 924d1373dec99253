//! JSONL transcript parsing for agent session files
//!
//! # Error Handling Strategy
//!
//! - **Individual line failures**: Malformed lines are logged through `tracing` and skipped,
//!   so one bad line does not hide the rest of a transcript.
//!
//! - **Catastrophic failure detection**: If >50% of lines fail to parse, or if >100 consecutive
//!   errors occur, the parser returns an error. The search pipeline treats that session as a
//!   non-match.
//!
//! - **Unknown line types**: Snapshot, token-count and other bookkeeping lines are ignored
//!   without counting as failures.

pub mod fields;
pub mod transcript;

pub use transcript::{ParsedTranscript, parse_transcript_file, parse_transcript_reader};
