// Tue Jan 13 2026 - Alex

use crate::crawler::chunk::{classify_asset, extract_chunk_groups, ChunkGroup};
use crate::crawler::settled::{DrainWatch, SettledSet};
use crate::crawler::CrawlError;
use crate::engine::Engine;
use crate::registry::{ChunkId, ModuleId};
use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use indexmap::IndexSet;
use log::{debug, info, warn};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Scanning,
    Loading,
    Draining,
    Done,
}

impl CrawlState {
    pub fn name(&self) -> &'static str {
        match self {
            CrawlState::Idle => "idle",
            CrawlState::Scanning => "scanning",
            CrawlState::Loading => "loading",
            CrawlState::Draining => "draining",
            CrawlState::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub modules_scanned: usize,
    pub chunk_groups: usize,
    pub valid_chunks: usize,
    pub invalid_chunks: usize,
    pub entry_points_required: usize,
    pub deferred_entry_points: usize,
    pub remainder_chunks: usize,
    pub remainder_modules_required: usize,
    pub require_failures: usize,
    pub poll_cycles: usize,
}

pub type ProgressFn = Box<dyn Fn(CrawlState, &CrawlStats)>;

/// Forces every chunk the bundle can reach to load, so that every patch and
/// lookup gets its chance to match.
pub struct ChunkCrawler {
    engine: Engine,
    state: Cell<CrawlState>,
    valid: RefCell<IndexSet<ChunkId>>,
    invalid: RefCell<IndexSet<ChunkId>>,
    settled: SettledSet,
    deferred: RefCell<Vec<ModuleId>>,
    marker_module: RefCell<Option<ModuleId>>,
    stats: RefCell<CrawlStats>,
    progress: Option<ProgressFn>,
}

impl ChunkCrawler {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            state: Cell::new(CrawlState::Idle),
            valid: RefCell::new(IndexSet::new()),
            invalid: RefCell::new(IndexSet::new()),
            settled: SettledSet::new(),
            deferred: RefCell::new(Vec::new()),
            marker_module: RefCell::new(None),
            stats: RefCell::new(CrawlStats::default()),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> CrawlState {
        self.state.get()
    }

    pub fn stats(&self) -> CrawlStats {
        self.stats.borrow().clone()
    }

    pub fn valid_chunks(&self) -> Vec<ChunkId> {
        self.valid.borrow().iter().cloned().collect()
    }

    pub fn invalid_chunks(&self) -> Vec<ChunkId> {
        self.invalid.borrow().iter().cloned().collect()
    }

    fn set_state(&self, state: CrawlState) {
        if self.state.replace(state) != state {
            debug!(target: "crawler", "State -> {}", state.name());
            if let Some(progress) = &self.progress {
                progress(state, &self.stats.borrow());
            }
        }
    }

    /// Runs the crawl to completion. Aborts as soon as the engine's fatal
    /// signal fires, dropping whatever was in flight.
    pub async fn run(&self) -> Result<CrawlStats, CrawlError> {
        let fatal = self.engine.fatal();
        let result = tokio::select! {
            biased;
            reason = fatal.wait() => Err(CrawlError::Fatal(reason)),
            result = self.crawl() => result,
        };

        if let Some(reason) = fatal.reason() {
            return Err(CrawlError::Fatal(reason));
        }
        result
    }

    async fn crawl(&self) -> Result<CrawlStats, CrawlError> {
        let mut cursor = 0;
        let mut cycles = 0;

        loop {
            cursor = self.scan_until_settled(cursor, &mut cycles).await?;

            let deferred = std::mem::take(&mut *self.deferred.borrow_mut());
            if deferred.is_empty() {
                break;
            }
            self.set_state(CrawlState::Loading);
            for id in &deferred {
                self.require_entry(id);
            }
            self.stats.borrow_mut().deferred_entry_points += deferred.len();
        }

        self.set_state(CrawlState::Done);
        self.load_remainder().await?;

        let unresolved = self.engine.lazy().fail_pending("nothing matched by the end of the crawl");
        if unresolved > 0 {
            debug!(target: "crawler", "{} lookups never resolved", unresolved);
        }

        let stats = self.stats();
        info!(
            target: "crawler",
            "Crawl done: {} modules scanned, {} valid and {} invalid chunks",
            stats.modules_scanned, stats.valid_chunks, stats.invalid_chunks
        );
        Ok(stats)
    }

    /// Scans each newly observed module exactly once, starting at `cursor`,
    /// until no scan is running, no module is waiting and the settled set has
    /// held still for the configured number of polls.
    async fn scan_until_settled(&self, mut cursor: usize, cycles: &mut usize) -> Result<usize, CrawlError> {
        let config = self.engine.config();
        let mut tasks = FuturesUnordered::new();
        let mut watch = DrainWatch::new();

        loop {
            let (fresh, next) = self.engine.registry().observed_since(cursor);
            cursor = next;
            if !fresh.is_empty() {
                self.set_state(CrawlState::Scanning);
            }
            for id in fresh {
                let token = self.settled.register();
                tasks.push(self.scan_module(id, token));
            }

            if !tasks.is_empty() {
                tasks.next().await;
                continue;
            }

            self.set_state(CrawlState::Draining);
            *cycles += 1;
            self.stats.borrow_mut().poll_cycles = *cycles;
            if *cycles > config.max_poll_cycles {
                return Err(CrawlError::PollLimit {
                    cycles: config.max_poll_cycles,
                });
            }
            self.pause(config.poll_interval_ms).await;

            let quiet = self.engine.registry().len() == cursor;
            if watch.observe(&self.settled, config.settle_cycles) && quiet {
                return Ok(cursor);
            }
        }
    }

    async fn pause(&self, interval_ms: u64) {
        if interval_ms == 0 {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    async fn scan_module(&self, id: ModuleId, token: usize) {
        self.stats.borrow_mut().modules_scanned += 1;

        let source = self.engine.registry().get(&id).map(|r| r.raw_source().to_string());
        if let Some(source) = source {
            match extract_chunk_groups(&source) {
                Ok(groups) if !groups.is_empty() => {
                    let defer = self.claims_marker(&id, &source);
                    self.stats.borrow_mut().chunk_groups += groups.len();
                    join_all(groups.into_iter().map(|g| self.load_group(g, defer))).await;
                }
                Ok(_) => {}
                Err(e) => warn!(target: "crawler", "Could not scan module {}: {}", id, e),
            }
        }

        self.settled.settle(token);
    }

    /// Entry points in the first module carrying the deferred-entry marker
    /// must wait until everything else has loaded.
    fn claims_marker(&self, id: &ModuleId, source: &str) -> bool {
        let mut marker = self.marker_module.borrow_mut();
        match marker.as_ref() {
            Some(owner) => owner == id,
            None if source.contains(&self.engine.config().deferred_entry_marker) => {
                debug!(target: "crawler", "Deferring entry points of module {}", id);
                *marker = Some(id.clone());
                true
            }
            None => false,
        }
    }

    async fn load_group(&self, group: ChunkGroup, defer: bool) {
        let checks = join_all(group.chunk_ids.iter().map(|c| self.validate_chunk(c))).await;
        if group.chunk_ids.is_empty() || checks.contains(&false) {
            debug!(target: "crawler", "Skipping entry point {}: unloadable chunk", group.entry_point);
            return;
        }

        if let Err(e) = self.engine.load_chunks(&group.chunk_ids).await {
            warn!(target: "crawler", "Failed to load chunks for entry point {}: {}", group.entry_point, e);
            return;
        }

        if defer {
            self.deferred.borrow_mut().push(group.entry_point);
        } else {
            self.require_entry(&group.entry_point);
        }
    }

    /// A chunk is loadable when the host maps it to a script asset: not
    /// missing, not WASM, not a worker bundle.
    async fn validate_chunk(&self, chunk: &ChunkId) -> bool {
        if self.valid.borrow().contains(chunk) {
            return true;
        }
        if self.invalid.borrow().contains(chunk) {
            return false;
        }

        let host = self.engine.host().clone();
        let loadable = match host.chunk_asset(chunk) {
            None => {
                debug!(target: "crawler", "Chunk {} has no asset", chunk);
                false
            }
            Some(asset) => match host.fetch_asset(&asset).await {
                Ok(body) => {
                    let kind = classify_asset(&body, &self.engine.config().worker_asset_marker);
                    if !kind.is_loadable() {
                        debug!(target: "crawler", "Chunk {} is {:?}, not loading it", chunk, kind);
                    }
                    kind.is_loadable()
                }
                Err(e) => {
                    debug!(target: "crawler", "Chunk {}: {}", chunk, e);
                    false
                }
            },
        };

        let newly = if loadable {
            self.valid.borrow_mut().insert(chunk.clone())
        } else {
            self.invalid.borrow_mut().insert(chunk.clone())
        };
        if newly {
            let mut stats = self.stats.borrow_mut();
            if loadable {
                stats.valid_chunks += 1;
            } else {
                stats.invalid_chunks += 1;
            }
        }
        loadable
    }

    fn require_entry(&self, id: &ModuleId) -> bool {
        if !self.engine.registry().contains(id) {
            warn!(target: "crawler", "Entry point {} was never registered", id);
            return false;
        }
        match self.engine.require(id) {
            Ok(_) => {
                self.stats.borrow_mut().entry_points_required += 1;
                true
            }
            Err(e) => {
                self.stats.borrow_mut().require_failures += 1;
                warn!(target: "crawler", "Requiring {} failed: {}", id, e);
                false
            }
        }
    }

    /// Loads every chunk the asset map knows and no scan reached, then runs
    /// every module that has not run yet.
    async fn load_remainder(&self) -> Result<(), CrawlError> {
        let known = self.engine.host().known_chunk_ids()?;
        if known.is_empty() {
            self.engine.fatal().fire(CrawlError::NoChunkIds.to_string());
            return Err(CrawlError::NoChunkIds);
        }

        let remainder: Vec<ChunkId> = {
            let valid = self.valid.borrow();
            let invalid = self.invalid.borrow();
            known
                .into_iter()
                .filter(|c| !valid.contains(c) && !invalid.contains(c))
                .collect()
        };

        let mut loadable = Vec::new();
        for chunk in remainder {
            if self.validate_chunk(&chunk).await {
                loadable.push(chunk);
            }
        }
        self.stats.borrow_mut().remainder_chunks = loadable.len();

        let results = join_all(loadable.iter().map(|c| self.engine.load_chunk(c))).await;
        for (chunk, result) in loadable.iter().zip(results) {
            if let Err(e) = result {
                warn!(target: "crawler", "Failed to load chunk {}: {}", chunk, e);
            }
        }

        let unexecuted = self.engine.registry().unexecuted();
        for id in unexecuted {
            match self.engine.require(&id) {
                Ok(_) => self.stats.borrow_mut().remainder_modules_required += 1,
                Err(e) => {
                    self.stats.borrow_mut().require_failures += 1;
                    debug!(target: "crawler", "Requiring {} failed: {}", id, e);
                }
            }
        }
        Ok(())
    }
}
