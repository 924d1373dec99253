//! Background parsing of sessions the user is likely to open next.
//!
//! Prewarming fills the store's transcript cache ahead of time. It never
//! competes with foreground work: requests are dropped while the app is
//! inactive or the user typed recently, and duplicates of an in-flight or
//! already cached session are ignored. [`Prewarmer::cancel_all`] invalidates
//! every pending request without affecting any search.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::config::SearchConfig;
use crate::models::Session;
use crate::search::transcript::render_transcript;
use crate::store::SessionStore;

/// Why a prewarm request was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrewarmSkip {
    AppInactive,
    UserTyping,
    NoCache,
    AlreadyCached,
    InFlight,
}

struct Shared {
    store: Arc<dyn SessionStore>,
    in_flight: Mutex<HashSet<String>>,
    generation: AtomicU64,
    app_active: AtomicBool,
    last_typing: Mutex<Option<Instant>>,
    quiet_period: Duration,
}

pub struct Prewarmer {
    shared: Arc<Shared>,
}

impl Prewarmer {
    pub fn new(store: Arc<dyn SessionStore>, config: &SearchConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                in_flight: Mutex::new(HashSet::new()),
                generation: AtomicU64::new(0),
                app_active: AtomicBool::new(true),
                last_typing: Mutex::new(None),
                quiet_period: config.typing_quiet_period(),
            }),
        }
    }

    pub fn set_app_active(&self, active: bool) {
        self.shared.app_active.store(active, Ordering::SeqCst);
    }

    /// Record a keystroke; prewarming pauses for the quiet period after it
    pub fn note_typing(&self) {
        *self.shared.last_typing.lock() = Some(Instant::now());
    }

    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.lock().len()
    }

    /// Invalidate every pending request; their results are discarded
    pub fn cancel_all(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.in_flight.lock().clear();
    }

    /// Parse `session` in the background and cache its rendered transcript
    ///
    /// The task resolves to whether the cache was filled.
    pub fn prewarm(&self, session: Arc<Session>) -> Result<JoinHandle<bool>, PrewarmSkip> {
        let shared = &self.shared;

        if !shared.app_active.load(Ordering::SeqCst) {
            return Err(PrewarmSkip::AppInactive);
        }
        if shared.last_typing.lock().is_some_and(|at| at.elapsed() < shared.quiet_period) {
            return Err(PrewarmSkip::UserTyping);
        }

        let cache = shared.store.transcript_cache(session.source).ok_or(PrewarmSkip::NoCache)?;
        if cache.contains(&session.id) {
            return Err(PrewarmSkip::AlreadyCached);
        }
        if !shared.in_flight.lock().insert(session.id.clone()) {
            return Err(PrewarmSkip::InFlight);
        }

        let token = shared.generation.load(Ordering::SeqCst);
        let shared = Arc::clone(shared);

        Ok(tokio::spawn(async move {
            tokio::task::yield_now().await;
            let cached = shared.warm(token, &session).await;
            if shared.generation.load(Ordering::SeqCst) == token {
                shared.in_flight.lock().remove(&session.id);
            }
            cached
        }))
    }
}

impl Shared {
    async fn warm(&self, token: u64, session: &Session) -> bool {
        let parsed = if session.is_parsed() {
            None
        } else {
            match self.store.parse_full(session).await {
                Ok(parsed) => Some(Arc::new(parsed)),
                Err(e) => {
                    tracing::debug!(session = %session.id, error = %e, "prewarm parse failed");
                    return false;
                }
            }
        };

        if self.generation.load(Ordering::SeqCst) != token {
            return false;
        }

        let Some(cache) = self.store.transcript_cache(session.source) else {
            return false;
        };
        let transcript = render_transcript(parsed.as_deref().unwrap_or(session));
        cache.insert(&session.id, Arc::from(transcript));

        if let Some(parsed) = parsed {
            self.store.update_session(parsed);
        }
        tracing::debug!(session = %session.id, "transcript prewarmed");
        true
    }
}
