use std::sync::Arc;

use crate::models::Session;
use crate::utils::file_size_on_disk;

/// Candidates split by size, each tier newest first
#[derive(Debug, Clone, Default)]
pub struct Tiers {
    pub small: Vec<Arc<Session>>,
    pub large: Vec<Arc<Session>>,
}

impl Tiers {
    pub fn len(&self) -> usize {
        self.small.len() + self.large.len()
    }

    pub fn is_empty(&self) -> bool {
        self.small.is_empty() && self.large.is_empty()
    }
}

/// Size used for tiering: cached byte count, then the file on disk, then zero
pub fn effective_size(session: &Session) -> u64 {
    session.file_size_bytes.or_else(|| file_size_on_disk(&session.file_path)).unwrap_or(0)
}

/// Split candidates at `threshold_bytes` (small is strictly below it)
///
/// Each session lands in exactly one tier. Sorting is stable, so sessions with
/// equal modification times keep their input order.
pub fn partition_by_size(candidates: &[Arc<Session>], threshold_bytes: u64) -> Tiers {
    let (mut small, mut large): (Vec<_>, Vec<_>) = candidates
        .iter()
        .cloned()
        .partition(|session| effective_size(session) < threshold_bytes);

    small.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
    large.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

    Tiers { small, large }
}
