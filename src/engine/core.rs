// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::crawler::chunk::{default_chunk_load_regex, extract_first_group};
use crate::engine::signal::FatalSignal;
use crate::host::{BundleHost, HostError, ModuleFactory};
use crate::lazy::{LazyRegistry, SearchCriteria, SearchKind};
use crate::patch::{PatchDescriptor, PatchEngine};
use crate::pattern::{CodeFragment, Regex};
use crate::registry::{ChunkId, InterceptOutcome, ModuleExports, ModuleId, ModuleRegistry};
use futures_util::future::{try_join_all, FutureExt, LocalBoxFuture, Shared};
use indexmap::IndexSet;
use log::{debug, error, info, warn};
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

type ChunkLoad = Shared<LocalBoxFuture<'static, Result<usize, HostError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Booting,
    Running,
    Failed,
}

struct Inner {
    config: Config,
    host: Rc<dyn BundleHost>,
    registry: RefCell<ModuleRegistry>,
    patches: RefCell<PatchEngine>,
    lazy: LazyRegistry,
    fatal: FatalSignal,
    chunk_loads: RefCell<HashMap<ChunkId, ChunkLoad>>,
    host_errors: RefCell<Vec<String>>,
    state: Cell<EngineState>,
}

/// The interception pipeline: factories come in from the host, get patched,
/// run, and feed the lazy registry.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<Inner>,
}

impl Engine {
    pub fn new(config: Config, host: Rc<dyn BundleHost>) -> Self {
        let registry = ModuleRegistry::new(config.strip_newlines);
        let patches = PatchEngine::new(Duration::from_millis(config.slow_patch_threshold_ms));
        let lazy = LazyRegistry::from_config(&config);

        Self {
            inner: Rc::new(Inner {
                config,
                host,
                registry: RefCell::new(registry),
                patches: RefCell::new(patches),
                lazy,
                fatal: FatalSignal::new(),
                chunk_loads: RefCell::new(HashMap::new()),
                host_errors: RefCell::new(Vec::new()),
                state: Cell::new(EngineState::Idle),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn host(&self) -> &Rc<dyn BundleHost> {
        &self.inner.host
    }

    pub fn registry(&self) -> Ref<'_, ModuleRegistry> {
        self.inner.registry.borrow()
    }

    pub fn patches(&self) -> Ref<'_, PatchEngine> {
        self.inner.patches.borrow()
    }

    pub fn lazy(&self) -> &LazyRegistry {
        &self.inner.lazy
    }

    pub fn fatal(&self) -> FatalSignal {
        self.inner.fatal.clone()
    }

    pub fn state(&self) -> EngineState {
        if self.inner.fatal.is_fired() {
            return EngineState::Failed;
        }
        self.inner.state.get()
    }

    /// Errors the host raised while running modules, in the order they happened.
    pub fn host_errors(&self) -> Vec<String> {
        self.inner.host_errors.borrow().clone()
    }

    pub fn register_patch(&self, descriptor: PatchDescriptor) -> usize {
        self.inner.patches.borrow_mut().register(descriptor)
    }

    /// Captures a factory and applies every patch that wants it. Runs before
    /// the host ever sees the factory.
    pub fn intercept(&self, factory: ModuleFactory) -> InterceptOutcome {
        let outcome = self.inner.registry.borrow_mut().intercept(&factory.id, &factory.source);
        if outcome != InterceptOutcome::Captured {
            return outcome;
        }

        let raw = match self.inner.registry.borrow().get(&factory.id) {
            Some(record) => record.raw_source().to_string(),
            None => return outcome,
        };

        let patched = self.inner.patches.borrow_mut().apply_patches(&factory.id, &raw);
        if let Some(source) = patched.source {
            debug!(target: "patcher", "Module {} patched by {}", factory.id, patched.applied.len());
            self.inner
                .registry
                .borrow_mut()
                .set_patched(&factory.id, source, patched.applied);
        }

        let failure = self.inner.patches.borrow().bootstrap_failure().map(str::to_string);
        if let Some(reason) = failure {
            self.inner.fatal.fire(reason);
        }
        outcome
    }

    /// Runs a captured module once and hands its exports to the lazy
    /// registry. A patched module that fails to run is retried as shipped.
    pub fn require(&self, id: &ModuleId) -> Result<ModuleExports, HostError> {
        let (patched, raw) = {
            let registry = self.inner.registry.borrow();
            let record = registry.get(id).ok_or_else(|| HostError::UnknownModule(id.clone()))?;
            if let (true, Some(exports)) = (record.resolved, &record.exports) {
                return Ok(exports.clone());
            }
            (record.patched_source.clone(), record.raw_source().to_string())
        };

        let exports = match self.inner.host.execute(id, patched.as_deref()) {
            Ok(exports) => exports,
            Err(e) if patched.is_some() => {
                error!(target: "patcher", "Patched module {} failed to run, using the original: {}", id, e);
                self.note_host_error(&e);
                self.inner.host.execute(id, None).map_err(|e| {
                    self.note_host_error(&e);
                    e
                })?
            }
            Err(e) => {
                self.note_host_error(&e);
                return Err(e);
            }
        };

        self.inner.registry.borrow_mut().mark_resolved(id, exports.clone());
        self.inner.lazy.notify_observed(id.clone(), exports.clone(), raw);
        self.inner.lazy.drain();
        Ok(exports)
    }

    fn note_host_error(&self, e: &HostError) {
        self.inner.host_errors.borrow_mut().push(e.to_string());
    }

    /// Loads a chunk and intercepts its factories. Concurrent calls for the
    /// same chunk share one load; returns how many modules were new.
    pub async fn load_chunk(&self, chunk: &ChunkId) -> Result<usize, HostError> {
        let load = {
            let mut loads = self.inner.chunk_loads.borrow_mut();
            loads
                .entry(chunk.clone())
                .or_insert_with(|| {
                    let engine = Rc::downgrade(&self.inner);
                    let chunk = chunk.clone();
                    async move { Self::fetch_chunk(engine, chunk).await }
                        .boxed_local()
                        .shared()
                })
                .clone()
        };
        load.await
    }

    async fn fetch_chunk(engine: Weak<Inner>, chunk: ChunkId) -> Result<usize, HostError> {
        let host = match engine.upgrade() {
            Some(inner) => Rc::clone(&inner.host),
            None => {
                return Err(HostError::ChunkLoadFailed {
                    chunk,
                    reason: "engine dropped".to_string(),
                })
            }
        };

        let factories = host.load_chunk(&chunk).await?;
        let inner = engine.upgrade().ok_or_else(|| HostError::ChunkLoadFailed {
            chunk: chunk.clone(),
            reason: "engine dropped".to_string(),
        })?;
        let engine = Engine { inner };

        let captured = factories
            .into_iter()
            .map(|f| engine.intercept(f))
            .filter(|outcome| *outcome == InterceptOutcome::Captured)
            .count();
        debug!(target: "crawler", "Chunk {} registered {} new modules", chunk, captured);
        Ok(captured)
    }

    pub async fn load_chunks(&self, chunks: &[ChunkId]) -> Result<usize, HostError> {
        let counts = try_join_all(chunks.iter().map(|c| self.load_chunk(c))).await?;
        Ok(counts.into_iter().sum())
    }

    /// Loads the host's initial chunks and runs its entry modules.
    pub async fn boot(&self) -> Result<(), HostError> {
        self.inner.state.set(EngineState::Booting);

        let initial = self.inner.host.initial_chunks();
        let captured = self.load_chunks(&initial).await?;
        info!(target: "crawler", "Booted {} initial chunks ({} modules)", initial.len(), captured);

        for id in self.inner.host.entry_modules() {
            if let Err(e) = self.require(&id) {
                warn!(target: "crawler", "Entry module {} failed: {}", id, e);
            }
        }

        let missing = self.inner.patches.borrow().pending_bootstrap();
        if !missing.is_empty() {
            self.inner
                .fatal
                .fire(format!("Bootstrap patch by {} found no module", missing.join(", ")));
        }

        self.inner.state.set(EngineState::Running);
        Ok(())
    }

    /// Source of the first module whose factory contains every fragment.
    pub fn find_module_factory(&self, code: &[CodeFragment]) -> Option<(ModuleId, String)> {
        self.inner
            .lazy
            .record(SearchKind::FindModuleFactory, SearchCriteria::Code(code.to_vec()));
        let registry = self.inner.registry.borrow();
        let id = registry.find_module_id(code)?;
        registry.get(&id).map(|r| (id, r.raw_source().to_string()))
    }

    /// Finds the module containing `code`, loads the chunks its first
    /// chunk-load expression names and runs that expression's entry point.
    /// `matcher` defaults to the standard chunk-load pattern.
    pub async fn extract_and_load_chunks(&self, code: &[CodeFragment], matcher: Option<&Regex>) -> bool {
        let matcher = match matcher {
            Some(m) => m.clone(),
            None => match default_chunk_load_regex() {
                Ok(m) => m,
                Err(e) => {
                    error!(target: "crawler", "Chunk-load pattern unusable: {}", e);
                    return false;
                }
            },
        };
        self.inner.lazy.record(
            SearchKind::ExtractAndLoadChunks,
            SearchCriteria::ExtractAndLoad {
                code: code.to_vec(),
                matcher: matcher.clone(),
            },
        );
        self.load_matched_chunks(code, &matcher).await
    }

    /// Records the search now and defers the loading until
    /// [`ChunkLoader::load`] is awaited.
    pub fn extract_and_load_chunks_lazy(&self, code: Vec<CodeFragment>, matcher: Regex) -> ChunkLoader {
        self.inner.lazy.record(
            SearchKind::ExtractAndLoadChunks,
            SearchCriteria::ExtractAndLoad {
                code: code.clone(),
                matcher: matcher.clone(),
            },
        );
        ChunkLoader {
            engine: self.clone(),
            code,
            matcher,
            loaded: Cell::new(false),
        }
    }

    async fn load_matched_chunks(&self, code: &[CodeFragment], matcher: &Regex) -> bool {
        let found = {
            let registry = self.inner.registry.borrow();
            registry
                .find_module_id(code)
                .and_then(|id| registry.get(&id).map(|r| (id, r.raw_source().to_string())))
        };
        let Some((id, source)) = found else {
            warn!(target: "crawler", "extractAndLoadChunks: couldn't find module factory");
            return false;
        };

        let group = match extract_first_group(&source, matcher) {
            Ok(Some(group)) => group,
            Ok(None) => {
                warn!(target: "crawler", "extractAndLoadChunks: no chunk loading in module {}", id);
                return false;
            }
            Err(e) => {
                warn!(target: "crawler", "extractAndLoadChunks: {}", e);
                return false;
            }
        };

        if let Err(e) = self.load_chunks(&group.chunk_ids).await {
            warn!(target: "crawler", "extractAndLoadChunks: {}", e);
            return false;
        }
        if !self.inner.registry.borrow().contains(&group.entry_point) {
            warn!(
                target: "crawler",
                "extractAndLoadChunks: entry point {} was not loaded", group.entry_point
            );
            return false;
        }

        match self.require(&group.entry_point) {
            Ok(_) => true,
            Err(e) => {
                warn!(target: "crawler", "extractAndLoadChunks: {}", e);
                false
            }
        }
    }

    /// Replays every recorded search against the modules executed so far.
    /// Chunk extractions are performed again, so one only counts as found
    /// when its chunks load and its entry point runs. Returns the
    /// description of each search that still finds nothing, once per
    /// distinct description.
    pub async fn replay_history(&self) -> Vec<String> {
        let max_len = self.inner.config.criteria_truncation;
        let mut failed = IndexSet::new();

        for entry in self.inner.lazy.history() {
            let found = match self.inner.lazy.replay_entry(&entry) {
                Some(found) => found,
                None => self.replay_module_search(&entry.criteria).await,
            };
            if !found {
                failed.insert(entry.describe(max_len));
            }
        }
        failed.into_iter().collect()
    }

    async fn replay_module_search(&self, criteria: &SearchCriteria) -> bool {
        match criteria {
            SearchCriteria::Code(code) => !self.inner.registry.borrow().search(code).is_empty(),
            SearchCriteria::ExtractAndLoad { code, matcher } => self.load_matched_chunks(code, matcher).await,
            _ => false,
        }
    }

    pub fn reset(&self) {
        self.inner.registry.borrow_mut().reset();
        self.inner.patches.borrow_mut().reset();
        self.inner.lazy.reset();
        self.inner.chunk_loads.borrow_mut().clear();
        self.inner.host_errors.borrow_mut().clear();
        self.inner.fatal.reset();
        self.inner.state.set(EngineState::Idle);
    }
}

/// A deferred `extract_and_load_chunks`. Succeeds at most once; later calls
/// return straight away.
pub struct ChunkLoader {
    engine: Engine,
    code: Vec<CodeFragment>,
    matcher: Regex,
    loaded: Cell<bool>,
}

impl ChunkLoader {
    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    pub async fn load(&self) -> bool {
        if self.loaded.get() {
            return true;
        }
        let ok = self.engine.load_matched_chunks(&self.code, &self.matcher).await;
        self.loaded.set(ok);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Snapshot, SnapshotHost};
    use crate::lazy::ExportAccess;
    use crate::patch::PatchRule;
    use crate::pattern::{cache, RegexRewrite, Replacement};
    use crate::registry::ExportValue;

    fn engine_for(snapshot: Snapshot) -> (Engine, Rc<SnapshotHost>) {
        let host = Rc::new(SnapshotHost::new(snapshot));
        let engine = Engine::new(Config::default(), host.clone());
        (engine, host)
    }

    fn rule(pattern: &str, replace: &str) -> PatchRule {
        PatchRule::new(Rc::new(RegexRewrite::new(
            cache::compile(pattern).unwrap(),
            Replacement::template(replace),
        )))
    }

    fn base() -> Snapshot {
        Snapshot::new()
            .with_script_chunk("0", &["1", "2"])
            .with_initial_chunk("0")
            .with_entry_module("1")
            .with_module("1", "FOO_MARKER;var BAR=1;", ExportValue::object([("fooExport", ExportValue::function("()=>1"))]))
            .with_module(
                "2",
                r#"e=>Promise.all([n.e("5")]).then(n.bind(n,"50"))"#,
                ExportValue::object([("other", ExportValue::null())]),
            )
            .with_script_chunk("5", &["50"])
            .with_module("50", "LAZY_ENTRY", ExportValue::object([("lazyThing", ExportValue::null())]))
    }

    #[tokio::test]
    async fn test_boot_patches_and_runs_entry() {
        let (engine, host) = engine_for(base());
        engine.register_patch(PatchDescriptor::new("Demo", CodeFragment::text("FOO_MARKER")).with_rule(rule("BAR=1", "BAR=2")));
        engine.boot().await.unwrap();

        let registry = engine.registry();
        let record = registry.get(&ModuleId::from("1")).unwrap();
        assert_eq!(record.effective_source(), "FOO_MARKER;var BAR=2;");
        assert!(record.resolved);
        assert_eq!(host.executed_modules(), vec![ModuleId::from("1")]);
        assert_eq!(engine.state(), EngineState::Running);
    }

    #[tokio::test]
    async fn test_lookup_resolves_on_require() {
        let (engine, _) = engine_for(base());
        let deferred = engine.lazy().find_by_props(["lazyThing"]).unwrap();
        engine.boot().await.unwrap();
        assert!(!deferred.is_resolved());

        assert!(engine.extract_and_load_chunks(&[CodeFragment::text("Promise.all")], None).await);
        assert!(deferred.is_resolved());
        assert!(deferred.prop("lazyThing").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_extract_and_load_reports_each_failure() {
        let (engine, _) = engine_for(base());
        engine.boot().await.unwrap();
        assert!(!engine.extract_and_load_chunks(&[CodeFragment::text("NOWHERE")], None).await);
        assert!(!engine.extract_and_load_chunks(&[CodeFragment::text("FOO_MARKER")], None).await);
        assert_eq!(engine.replay_history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_chunk_loader_is_lazy() {
        let (engine, host) = engine_for(base());
        engine.boot().await.unwrap();
        let loader = engine.extract_and_load_chunks_lazy(
            vec![CodeFragment::text("Promise.all")],
            default_chunk_load_regex().unwrap(),
        );
        assert!(!host.loaded_chunks().contains(&ChunkId::from("5")));
        assert!(loader.load().await);
        assert!(loader.is_loaded());
        assert!(host.loaded_chunks().contains(&ChunkId::from("5")));
    }

    #[tokio::test]
    async fn test_concurrent_chunk_loads_share_one_fetch() {
        let (engine, host) = engine_for(base());
        let chunk = ChunkId::from("5");
        let (a, b) = tokio::join!(engine.load_chunk(&chunk), engine.load_chunk(&chunk));
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(host.loaded_chunks(), vec![chunk]);
    }

    #[tokio::test]
    async fn test_broken_patch_falls_back_to_original() {
        let snapshot = Snapshot::new()
            .with_script_chunk("0", &["1"])
            .with_initial_chunk("0")
            .with_entry_module("1")
            .with_fragile_module("1", "FOO_MARKER;x()", ExportValue::object([("ok", ExportValue::null())]), "BROKEN");
        let (engine, _) = engine_for(snapshot);
        engine.register_patch(PatchDescriptor::new("Demo", CodeFragment::text("FOO_MARKER")).with_rule(rule(r"x\(\)", "BROKEN(")));
        engine.boot().await.unwrap();

        assert!(engine.registry().get(&ModuleId::from("1")).unwrap().resolved);
        assert_eq!(engine.host_errors().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_bootstrap_is_fatal() {
        let (engine, _) = engine_for(base());
        engine.register_patch(
            PatchDescriptor::new("Core", CodeFragment::text("NOT_THERE"))
                .with_rule(rule("a", "b"))
                .with_bootstrap(true),
        );
        engine.boot().await.unwrap();
        assert_eq!(engine.state(), EngineState::Failed);
        assert!(engine.fatal().reason().unwrap().contains("Core"));
    }

    #[tokio::test]
    async fn test_find_module_factory_is_replayed() {
        let (engine, _) = engine_for(base());
        engine.boot().await.unwrap();
        let (id, _) = engine.find_module_factory(&[CodeFragment::text("FOO_MARKER")]).unwrap();
        assert_eq!(id, ModuleId::from("1"));
        assert!(engine.find_module_factory(&[CodeFragment::text("MISSING")]).is_none());
        assert_eq!(engine.replay_history().await, vec!["findModuleFactory(\"MISSING\")".to_string()]);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (engine, _) = engine_for(base());
        engine.boot().await.unwrap();
        engine.reset();
        assert!(engine.registry().is_empty());
        assert_eq!(engine.state(), EngineState::Idle);
    }
}
