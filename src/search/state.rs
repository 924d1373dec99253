//! Published search state and the generation token guarding it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::models::{Progress, Session};

/// What observers of a search see
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub is_running: bool,
    pub was_canceled: bool,
    /// Append-only during a run, reset when a new run starts
    pub results: Vec<Arc<Session>>,
    pub progress: Progress,
}

impl SearchState {
    pub fn result_ids(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|session| session.id.as_str())
    }
}

/// Run identifier captured by every unit of work of one search
pub type Generation = u64;

/// Single writer for [`SearchState`]
///
/// Every mutation goes through the watch channel's write lock. Starting or
/// canceling a run bumps the generation under that same lock, so a publish
/// carrying a stale token can never land after the reset that replaced it.
#[derive(Debug)]
pub struct StateHandle {
    tx: watch::Sender<SearchState>,
    generation: AtomicU64,
}

impl StateHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SearchState::default());
        Self { tx, generation: AtomicU64::new(0) }
    }

    pub fn current(&self) -> Generation {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, token: Generation) -> bool {
        self.current() == token
    }

    /// Invalidate any active run and reset state for a new one
    pub fn begin_run(&self) -> Generation {
        let mut token = 0;
        self.tx.send_modify(|state| {
            token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = SearchState { is_running: true, ..SearchState::default() };
        });
        token
    }

    /// Invalidate the active run, marking it canceled
    ///
    /// Results gathered so far stay visible. Returns whether a run was active.
    pub fn cancel_run(&self) -> bool {
        self.tx.send_if_modified(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            if !state.is_running {
                return false;
            }
            state.is_running = false;
            state.was_canceled = true;
            state.progress = Progress::default();
            true
        })
    }

    /// Apply `update` if `token` still owns the state
    ///
    /// Returns `false` when the run was superseded; the update is dropped.
    pub fn publish(&self, token: Generation, update: impl FnOnce(&mut SearchState)) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|state| {
            if !self.is_current(token) {
                return false;
            }
            update(state);
            applied = true;
            true
        });
        applied
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SearchState {
        self.tx.borrow().clone()
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}
