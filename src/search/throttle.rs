//! Local buffer that rate-limits publishing of hits and scan counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::models::Session;

/// Updates accumulated since the last flush
#[derive(Debug, Default)]
pub struct PendingUpdate {
    pub hits: Vec<Arc<Session>>,
    pub scanned_small: usize,
    pub scanned_large: usize,
}

impl PendingUpdate {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.scanned_small == 0 && self.scanned_large == 0
    }
}

/// Accumulates scan output until the throttle window elapses
///
/// With throttling off every unit flushes immediately. With coalescing off,
/// new hits flush immediately while bare counter updates still wait for the
/// window.
#[derive(Debug)]
pub struct UpdateBuffer {
    interval: Option<Duration>,
    coalesce: bool,
    last_flush: Instant,
    pending: PendingUpdate,
}

impl UpdateBuffer {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            interval: config.throttle_ui_updates.then(|| config.throttle_interval()),
            coalesce: config.coalesce_results,
            last_flush: Instant::now(),
            pending: PendingUpdate::default(),
        }
    }

    pub fn push_hits(&mut self, hits: impl IntoIterator<Item = Arc<Session>>) {
        self.pending.hits.extend(hits);
    }

    pub fn record_small(&mut self, count: usize) {
        self.pending.scanned_small += count;
    }

    pub fn record_large(&mut self, count: usize) {
        self.pending.scanned_large += count;
    }

    pub fn should_flush(&self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        match self.interval {
            None => true,
            Some(_) if !self.coalesce && !self.pending.hits.is_empty() => true,
            Some(interval) => self.last_flush.elapsed() >= interval,
        }
    }

    /// Hand over everything pending and restart the window
    pub fn take(&mut self) -> PendingUpdate {
        self.last_flush = Instant::now();
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::SessionSource;

    fn hit(id: &str) -> Arc<Session> {
        Arc::new(Session::new(id, SessionSource::Codex, format!("/tmp/{id}.jsonl"), Utc::now()))
    }

    fn config(throttle: bool, coalesce: bool, interval_ms: u64) -> SearchConfig {
        SearchConfig {
            throttle_ui_updates: throttle,
            coalesce_results: coalesce,
            throttle_interval_ms: interval_ms,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_empty_buffer_never_flushes() {
        let buffer = UpdateBuffer::new(&config(false, true, 0));
        assert!(!buffer.should_flush());
    }

    #[test]
    fn test_unthrottled_flushes_every_unit() {
        let mut buffer = UpdateBuffer::new(&config(false, true, 10_000));
        buffer.record_small(1);
        assert!(buffer.should_flush());
    }

    #[test]
    fn test_throttled_waits_for_window() {
        let mut buffer = UpdateBuffer::new(&config(true, true, 60_000));
        buffer.push_hits([hit("a")]);
        buffer.record_small(64);
        assert!(!buffer.should_flush());

        let pending = buffer.take();
        assert_eq!(pending.hits.len(), 1);
        assert_eq!(pending.scanned_small, 64);
        assert!(buffer.take().is_empty());
    }

    #[test]
    fn test_elapsed_window_flushes() {
        let mut buffer = UpdateBuffer::new(&config(true, true, 0));
        buffer.record_large(1);
        assert!(buffer.should_flush());
    }

    #[test]
    fn test_no_coalesce_flushes_hits_immediately() {
        let mut buffer = UpdateBuffer::new(&config(true, false, 60_000));
        buffer.record_small(10);
        assert!(!buffer.should_flush());
        buffer.push_hits([hit("a")]);
        assert!(buffer.should_flush());
    }
}
