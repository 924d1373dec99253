//! Search orchestration.
//!
//! One [`SearchCoordinator`] owns the published [`SearchState`] and runs at
//! most one search at a time. A run takes one of two routes:
//!
//! - **Index fast path** when a [`BackingIndex`] reports data for the allowed
//!   sources: structured-only queries are answered by the prefilter, text
//!   queries by full-text search, then sessions the index cannot answer for are
//!   deep-scanned.
//! - **Fallback** otherwise: the candidates are split into size tiers, small
//!   sessions are matched in parallel batches and large ones one at a time in
//!   recency order (reorderable through [`SearchCoordinator::promote`]).
//!
//! Every unit of work carries the generation token of its run and stops at the
//! next checkpoint once a newer run or a cancel has replaced it. Index, parse
//! and matcher failures only ever shrink the result set.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rayon::prelude::*;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::SearchConfig;
use crate::models::{Filters, SearchPhase, Session, SessionSource, TextScope};
use crate::query::rewrite_query;
use crate::search::index::{BackingIndex, IndexQuery};
use crate::search::matcher::FilterMatcher;
use crate::search::partition::{effective_size, partition_by_size};
use crate::search::promotion::{PromotionSlot, apply_promotion};
use crate::search::state::{Generation, SearchState, StateHandle};
use crate::search::throttle::UpdateBuffer;
use crate::store::{SessionStore, TranscriptCache};

/// Sleep between units of work in low-priority mode
const LOW_PRIORITY_PAUSE: Duration = Duration::from_millis(2);

/// One search invocation
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub filters: Filters,
    /// Allowed agent sources; empty allows every source
    pub sources: Vec<SessionSource>,
    pub candidates: Vec<Arc<Session>>,
    /// Whether unparsed candidates may be fully parsed during the scan
    pub deep_parse: bool,
}

impl SearchRequest {
    pub fn new(filters: Filters, candidates: Vec<Arc<Session>>) -> Self {
        Self { filters, sources: Vec::new(), candidates, deep_parse: true }
    }

    pub fn with_sources(mut self, sources: impl Into<Vec<SessionSource>>) -> Self {
        self.sources = sources.into();
        self
    }

    pub fn with_deep_parse(mut self, deep_parse: bool) -> Self {
        self.deep_parse = deep_parse;
        self
    }
}

/// Residual set a tiered scan covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    /// No usable index, every candidate
    Legacy,
    /// Candidates the index has not covered
    Unindexed,
    /// Indexed candidates whose tool outputs the index may have missed
    ToolOutputs,
}

impl ScanKind {
    fn phases(self) -> (SearchPhase, SearchPhase) {
        match self {
            ScanKind::Legacy => (SearchPhase::LegacySmall, SearchPhase::LegacyLarge),
            ScanKind::Unindexed => (SearchPhase::UnindexedSmall, SearchPhase::UnindexedLarge),
            ScanKind::ToolOutputs => (SearchPhase::ToolOutputsSmall, SearchPhase::ToolOutputsLarge),
        }
    }

    fn scope(self) -> TextScope {
        match self {
            ScanKind::Legacy | ScanKind::Unindexed => TextScope::All,
            ScanKind::ToolOutputs => TextScope::ToolOutputs,
        }
    }
}

/// The run's generation token is no longer current
#[derive(Debug)]
struct Superseded;

type Step<T = ()> = std::result::Result<T, Superseded>;

/// Transcript caches of the store, looked up once per run
#[derive(Default)]
struct Caches(HashMap<SessionSource, Arc<dyn TranscriptCache>>);

impl Caches {
    fn from_store(store: &dyn SessionStore) -> Self {
        Self(
            SessionSource::ALL
                .into_iter()
                .filter_map(|source| store.transcript_cache(source).map(|cache| (source, cache)))
                .collect(),
        )
    }

    fn get(&self, source: SessionSource) -> Option<&dyn TranscriptCache> {
        self.0.get(&source).map(|cache| cache.as_ref())
    }
}

/// Per-run state threaded through every scan step
struct RunContext {
    token: Generation,
    filters: Arc<Filters>,
    deep_parse: bool,
    caches: Arc<Caches>,
    /// Ids already reported in this run
    seen: HashSet<String>,
}

impl RunContext {
    fn fresh(&mut self, hits: impl IntoIterator<Item = Arc<Session>>) -> Vec<Arc<Session>> {
        hits.into_iter().filter(|session| self.seen.insert(session.id.clone())).collect()
    }
}

struct Inner {
    config: SearchConfig,
    store: Arc<dyn SessionStore>,
    index: Option<Arc<dyn BackingIndex>>,
    matcher: Arc<dyn FilterMatcher>,
    state: StateHandle,
    promotion: PromotionSlot,
}

pub struct SearchCoordinator {
    inner: Arc<Inner>,
}

impl SearchCoordinator {
    pub fn new(
        config: SearchConfig,
        store: Arc<dyn SessionStore>,
        index: Option<Arc<dyn BackingIndex>>,
        matcher: Arc<dyn FilterMatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: config.sanitized(),
                store,
                index,
                matcher,
                state: StateHandle::new(),
                promotion: PromotionSlot::new(),
            }),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.inner.config
    }

    /// Start a search, superseding any active one
    ///
    /// Returns immediately; the run proceeds on the tokio runtime. The handle
    /// resolves when the run finishes or notices it was superseded.
    pub fn start(&self, request: SearchRequest) -> JoinHandle<()> {
        let token = self.inner.state.begin_run();
        self.inner.promotion.clear();
        tracing::debug!(
            generation = token,
            candidates = request.candidates.len(),
            "search started"
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(token, request).await })
    }

    /// Stop the active search; results found so far stay published
    pub fn cancel(&self) {
        if self.inner.state.cancel_run() {
            tracing::debug!("search canceled");
        }
    }

    /// Ask the large-tier scan to process `session_id` next
    pub fn promote(&self, session_id: impl Into<String>) {
        self.inner.promotion.offer(session_id);
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> SearchState {
        self.inner.state.snapshot()
    }
}

impl Inner {
    async fn run(&self, token: Generation, request: SearchRequest) {
        match self.execute(token, request).await {
            Ok(()) => self.finish(token),
            Err(Superseded) => tracing::debug!(generation = token, "search superseded"),
        }
    }

    async fn execute(&self, token: Generation, request: SearchRequest) -> Step {
        let SearchRequest { filters, sources, candidates, deep_parse } = request;

        let sources = if sources.is_empty() { SessionSource::ALL.to_vec() } else { sources };
        let candidates: Vec<Arc<Session>> =
            candidates.into_iter().filter(|session| sources.contains(&session.source)).collect();
        let filters = self.matcher.parse_operators(&filters.query).apply_to(&filters);

        if !filters.has_text() && !filters.has_structured() {
            tracing::debug!("empty query, nothing to search");
            return Ok(());
        }

        let mut ctx = RunContext {
            token,
            filters: Arc::new(filters),
            deep_parse,
            caches: Arc::new(Caches::from_store(self.store.as_ref())),
            seen: HashSet::new(),
        };

        if let Some(index) = &self.index
            && self.index_ready(index.as_ref(), &sources).await
        {
            self.checkpoint(token)?;
            return self.search_indexed(index.as_ref(), &sources, &candidates, &mut ctx).await;
        }

        self.scan_tiers(&candidates, ScanKind::Legacy, &mut ctx).await
    }

    async fn index_ready(&self, index: &dyn BackingIndex, sources: &[SessionSource]) -> bool {
        best_effort("has_search_data", index.has_search_data(sources)).await
    }

    async fn search_indexed(
        &self,
        index: &dyn BackingIndex,
        sources: &[SessionSource],
        candidates: &[Arc<Session>],
        ctx: &mut RunContext,
    ) -> Step {
        let token = ctx.token;
        let by_id: HashMap<&str, &Arc<Session>> =
            candidates.iter().map(|session| (session.id.as_str(), session)).collect();
        let resolve = |ids: Vec<String>| -> Vec<Arc<Session>> {
            ids.iter().filter_map(|id| by_id.get(id.as_str()).map(|s| Arc::clone(s))).collect()
        };

        let cap = self.config.index_result_cap;
        let base = IndexQuery::from_filters(sources, &ctx.filters, cap)
            .with_system_probes(self.config.include_system_probes);

        if !ctx.filters.has_text() {
            let ids = best_effort("prefilter_session_ids", index.prefilter_session_ids(&base)).await;
            self.checkpoint(token)?;
            let hits = ctx.fresh(resolve(ids));
            tracing::debug!(hits = hits.len(), "structured query answered by index prefilter");
            return self.publish(token, |state| {
                state.progress.advance_phase(SearchPhase::Indexed);
                state.results.extend(hits);
            });
        }

        self.publish(token, |state| state.progress.advance_phase(SearchPhase::Indexed))?;

        let query = base.with_text(rewrite_query(&ctx.filters.query));
        let ids = best_effort("search_session_ids_fts", index.search_session_ids_fts(&query)).await;
        self.checkpoint(token)?;
        let instant_count = ids.len();
        let hits = ctx.fresh(resolve(ids));
        tracing::debug!(query = %query.query, hits = hits.len(), "index search answered");
        self.publish(token, |state| state.results.extend(hits))?;

        if instant_count < cap && self.config.recent_tool_io_index {
            let ids = best_effort(
                "search_session_ids_tool_io_fts",
                index.search_session_ids_tool_io_fts(&query),
            )
            .await;
            self.checkpoint(token)?;
            let extra = ctx.fresh(resolve(ids));
            if !extra.is_empty() {
                self.publish(token, |state| state.results.extend(extra))?;
            }
        }

        let indexed = best_effort("indexed_session_ids", index.indexed_session_ids(sources)).await;
        self.checkpoint(token)?;

        let (covered, unindexed): (Vec<_>, Vec<_>) = candidates
            .iter()
            .cloned()
            .partition(|session| indexed.contains(&session.id));
        let tool_outputs: Vec<Arc<Session>> = if self.config.deep_tool_output_scan {
            covered
                .into_iter()
                .filter(|session| !ctx.seen.contains(&session.id) && session.hints_tool_output())
                .collect()
        } else {
            Vec::new()
        };

        tracing::debug!(
            unindexed = unindexed.len(),
            tool_outputs = tool_outputs.len(),
            "residual sets for deep scan"
        );

        if !unindexed.is_empty() {
            self.scan_tiers(&unindexed, ScanKind::Unindexed, ctx).await?;
        }
        if !tool_outputs.is_empty() {
            self.scan_tiers(&tool_outputs, ScanKind::ToolOutputs, ctx).await?;
        }
        Ok(())
    }

    async fn scan_tiers(&self, candidates: &[Arc<Session>], kind: ScanKind, ctx: &mut RunContext) -> Step {
        let token = ctx.token;
        let tiers = partition_by_size(candidates, self.config.large_session_threshold_bytes);
        let (small_phase, large_phase) = kind.phases();
        tracing::debug!(?kind, small = tiers.small.len(), large = tiers.large.len(), "tiered scan");

        self.publish(token, |state| {
            state.progress.add_totals(tiers.small.len(), tiers.large.len());
            state.progress.advance_phase(small_phase);
        })?;

        let mut buffer = UpdateBuffer::new(&self.config);

        for batch in tiers.small.chunks(self.config.small_batch_size) {
            let hits = self.scan_small_batch(batch, kind.scope(), ctx).await;
            self.checkpoint(token)?;

            buffer.push_hits(ctx.fresh(hits));
            buffer.record_small(batch.len());
            if buffer.should_flush() {
                self.flush(token, &mut buffer)?;
            }

            self.pause().await;
            self.checkpoint(token)?;
        }
        self.flush(token, &mut buffer)?;

        self.publish(token, |state| state.progress.advance_phase(large_phase))?;

        let mut queue = tiers.large;
        for pos in 0..queue.len() {
            if let Some(promoted) = self.promotion.take()
                && apply_promotion(&mut queue, pos, &promoted, |s| s.id.as_str())
            {
                tracing::debug!(session = %promoted, "promoted session scanned next");
            }

            let hit = self.scan_large_item(Arc::clone(&queue[pos]), kind.scope(), ctx).await;
            self.checkpoint(token)?;

            buffer.push_hits(ctx.fresh(hit));
            buffer.record_large(1);
            if buffer.should_flush() {
                self.flush(token, &mut buffer)?;
            }

            self.pause().await;
            self.checkpoint(token)?;
        }
        self.flush(token, &mut buffer)
    }

    /// Matches of one small-tier batch, in batch order
    async fn scan_small_batch(&self, batch: &[Arc<Session>], scope: TextScope, ctx: &RunContext) -> Vec<Arc<Session>> {
        let threshold = self.config.large_session_threshold_bytes;
        let prepared = self
            .prepare_batch(batch, |session| ctx.deep_parse && effective_size(session) < threshold)
            .await;

        let matcher = Arc::clone(&self.matcher);
        let filters = Arc::clone(&ctx.filters);
        let caches = Arc::clone(&ctx.caches);
        let matched = tokio::task::spawn_blocking(move || {
            prepared
                .into_par_iter()
                .filter(|session| {
                    matcher.session_matches(session, &filters, caches.get(session.source), true, scope)
                })
                .collect::<Vec<_>>()
        })
        .await;

        matched.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "batch matching task failed");
            Vec::new()
        })
    }

    /// Parse what may be parsed, concurrently; failed parses drop out
    async fn prepare_batch(
        &self,
        batch: &[Arc<Session>],
        may_parse: impl Fn(&Session) -> bool,
    ) -> Vec<Arc<Session>> {
        let mut prepared: Vec<Option<Arc<Session>>> = batch
            .iter()
            .map(|session| (session.is_parsed() || !may_parse(session.as_ref())).then(|| Arc::clone(session)))
            .collect();

        let mut parses = JoinSet::new();
        for (i, session) in batch.iter().enumerate() {
            if prepared[i].is_some() {
                continue;
            }
            let store = Arc::clone(&self.store);
            let session = Arc::clone(session);
            parses.spawn(async move { (i, parse_and_store(store.as_ref(), &session).await) });
        }

        while let Some(joined) = parses.join_next().await {
            match joined {
                Ok((i, parsed)) => prepared[i] = parsed,
                Err(e) => tracing::warn!(error = %e, "parse task failed"),
            }
        }

        prepared.into_iter().flatten().collect()
    }

    async fn scan_large_item(&self, session: Arc<Session>, scope: TextScope, ctx: &RunContext) -> Option<Arc<Session>> {
        let session = if session.is_parsed() || !ctx.deep_parse {
            session
        } else {
            parse_and_store(self.store.as_ref(), &session).await?
        };

        let matcher = Arc::clone(&self.matcher);
        let filters = Arc::clone(&ctx.filters);
        let caches = Arc::clone(&ctx.caches);
        let matched = tokio::task::spawn_blocking(move || {
            matcher
                .session_matches(&session, &filters, caches.get(session.source), false, scope)
                .then_some(session)
        })
        .await;

        matched.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "large session matching task failed");
            None
        })
    }

    fn flush(&self, token: Generation, buffer: &mut UpdateBuffer) -> Step {
        let pending = buffer.take();
        if pending.is_empty() {
            return Ok(());
        }
        self.publish(token, |state| {
            state.results.extend(pending.hits);
            state.progress.record_small(pending.scanned_small);
            state.progress.record_large(pending.scanned_large);
        })
    }

    fn finish(&self, token: Generation) {
        let mut results = 0;
        let finished = self.state.publish(token, |state| {
            state.is_running = false;
            state.progress.phase = SearchPhase::Idle;
            results = state.results.len();
        });
        if finished {
            tracing::info!(generation = token, results, "search finished");
        }
    }

    fn publish(&self, token: Generation, update: impl FnOnce(&mut SearchState)) -> Step {
        if self.state.publish(token, update) { Ok(()) } else { Err(Superseded) }
    }

    fn checkpoint(&self, token: Generation) -> Step {
        if self.state.is_current(token) { Ok(()) } else { Err(Superseded) }
    }

    async fn pause(&self) {
        tokio::task::yield_now().await;
        if self.config.lower_background_priority {
            tokio::time::sleep(LOW_PRIORITY_PAUSE).await;
        }
    }
}

/// Full parse handed back to the store; a failure reads as no match
async fn parse_and_store(store: &dyn SessionStore, session: &Session) -> Option<Arc<Session>> {
    match store.parse_full(session).await {
        Ok(parsed) => {
            let parsed = Arc::new(parsed);
            store.update_session(Arc::clone(&parsed));
            Some(parsed)
        }
        Err(e) => {
            tracing::debug!(session = %session.id, error = %e, "parse failed, skipping session");
            None
        }
    }
}

async fn best_effort<T: Default>(call: &'static str, lookup: impl Future<Output = Result<T>>) -> T {
    lookup.await.unwrap_or_else(|e| {
        tracing::debug!(call, error = %e, "index lookup failed, treating as empty");
        T::default()
    })
}
