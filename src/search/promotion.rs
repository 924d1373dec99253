//! Single-slot mailbox for reprioritizing the large-tier queue.

use parking_lot::Mutex;

/// Holds at most one pending promotion request
///
/// A later `offer` overwrites an unconsumed earlier one; `take` reads and
/// clears atomically.
#[derive(Debug, Default)]
pub struct PromotionSlot {
    pending: Mutex<Option<String>>,
}

impl PromotionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&self, session_id: impl Into<String>) {
        *self.pending.lock() = Some(session_id.into());
    }

    pub fn take(&self) -> Option<String> {
        self.pending.lock().take()
    }

    pub fn clear(&self) {
        self.pending.lock().take();
    }
}

/// Swap the item with `id` into `pos` if it is still pending after `pos`
///
/// Returns whether the queue changed. Items at or before `pos` are already
/// processed or in progress and are never moved.
pub fn apply_promotion<T>(queue: &mut [T], pos: usize, id: &str, id_of: impl Fn(&T) -> &str) -> bool {
    let Some(offset) = queue.get(pos + 1..).and_then(|rest| rest.iter().position(|item| id_of(item) == id))
    else {
        return false;
    };
    queue.swap(pos, pos + 1 + offset);
    true
}
