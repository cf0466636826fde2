// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::lazy::dependant::{DependantLazy, LazyFactory};
use crate::lazy::deferred::{Deferred, Strictness};
use crate::lazy::filter::Filter;
use crate::lazy::history::{HistoryEntry, SearchCriteria, SearchHistory, SearchKind};
use crate::lazy::mangled::{map_exports, unmapped};
use crate::lazy::LazyError;
use crate::pattern::CodeFragment;
use crate::registry::{ExportValue, ModuleExports, ModuleId};
use indexmap::IndexMap;
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

type Callback = Box<dyn FnOnce(ExportValue, ModuleId)>;
type FailHandler = Box<dyn FnOnce(&str)>;

struct Observed {
    id: ModuleId,
    exports: ModuleExports,
    source: String,
}

struct Subscription {
    filter: Filter,
    callback: Callback,
    on_fail: Option<FailHandler>,
}

struct State {
    observed: Vec<Observed>,
    queue: VecDeque<usize>,
    subscriptions: Vec<Subscription>,
    cache: HashMap<String, (ExportValue, ModuleId)>,
    history: SearchHistory,
    key_limit: usize,
    record_history: bool,
    draining: bool,
}

fn match_module(filter: &Filter, module: &Observed, key_limit: usize) -> Option<ExportValue> {
    if filter.targets_factory() {
        return filter
            .test_factory(&module.source)
            .then(|| module.exports.root().clone());
    }

    module
        .exports
        .candidates(key_limit)
        .into_iter()
        .find(|(_, value)| filter.test(value))
        .map(|(_, value)| value.clone())
}

/// Pending searches over executed modules, plus the cache and history that
/// back them.
///
/// Modules arrive through [`LazyRegistry::notify_observed`], which only
/// queues them. [`LazyRegistry::drain`] then takes queued modules one at a
/// time, oldest first, and hands each to every pending subscription in
/// registration order. A subscription leaves the table on its first match, so
/// the earliest observed module that satisfies a search wins. Callbacks run
/// with no internal borrow held: they may subscribe again or notify more
/// modules, which join the back of the queue the loop is working through.
#[derive(Clone)]
pub struct LazyRegistry {
    state: Rc<RefCell<State>>,
}

impl LazyRegistry {
    pub fn new(key_limit: usize, record_history: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                observed: Vec::new(),
                queue: VecDeque::new(),
                subscriptions: Vec::new(),
                cache: HashMap::new(),
                history: SearchHistory::new(),
                key_limit,
                record_history,
                draining: false,
            })),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.export_key_limit, config.record_history)
    }

    pub fn notify_observed(&self, id: ModuleId, exports: ModuleExports, source: String) {
        let mut state = self.state.borrow_mut();
        let index = state.observed.len();
        state.observed.push(Observed { id, exports, source });
        state.queue.push_back(index);
    }

    pub fn drain(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let hits = {
                let mut guard = self.state.borrow_mut();
                let state = &mut *guard;
                let Some(index) = state.queue.pop_front() else {
                    state.draining = false;
                    break;
                };

                let module = &state.observed[index];
                let mut hits = Vec::new();
                let mut keep = Vec::with_capacity(state.subscriptions.len());

                for sub in std::mem::take(&mut state.subscriptions) {
                    match match_module(&sub.filter, module, state.key_limit) {
                        Some(value) => {
                            state
                                .cache
                                .entry(sub.filter.signature())
                                .or_insert_with(|| (value.clone(), module.id.clone()));
                            hits.push((sub, value, module.id.clone()));
                        }
                        None => keep.push(sub),
                    }
                }
                state.subscriptions = keep;
                hits
            };

            for (sub, value, id) in hits {
                debug!(target: "lazy", "{} resolved by module {}", sub.filter.signature(), id);
                (sub.callback)(value, id);
            }
        }
    }

    pub fn observed_count(&self) -> usize {
        self.state.borrow().observed.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    pub fn record(&self, kind: SearchKind, criteria: SearchCriteria) {
        let mut state = self.state.borrow_mut();
        if state.record_history {
            trace!(target: "lazy", "{}({})", kind, criteria.describe());
            state.history.record(kind, criteria);
        }
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.borrow().history.entries().to_vec()
    }

    fn subscribe(&self, filter: Filter, callback: Callback, on_fail: Option<FailHandler>) {
        if let Some((value, id)) = self.cache_find(&filter) {
            callback(value, id);
            return;
        }
        self.state.borrow_mut().subscriptions.push(Subscription {
            filter,
            callback,
            on_fail,
        });
    }

    /// Calls `callback` with the first module export the filter accepts;
    /// right away if such a module already executed.
    pub fn wait_for(&self, filter: Filter, callback: impl FnOnce(ExportValue, ModuleId) + 'static) {
        self.record(SearchKind::WaitFor, SearchCriteria::Filter(filter.clone()));
        self.subscribe(filter, Box::new(callback), None);
    }

    fn find_as(&self, kind: SearchKind, filter: Filter, strictness: Strictness) -> Deferred<ExportValue> {
        let entry = HistoryEntry {
            kind,
            criteria: SearchCriteria::Filter(filter.clone()),
        };
        let deferred = Deferred::pending(entry.describe(usize::MAX), strictness);
        self.record(kind, SearchCriteria::Filter(filter.clone()));

        let target = deferred.clone();
        let failing = deferred.clone();
        self.subscribe(
            filter,
            Box::new(move |value, _| {
                target.resolve(value);
            }),
            Some(Box::new(move |reason| {
                failing.fail(reason);
            })),
        );
        deferred
    }

    pub fn find(&self, filter: Filter) -> Deferred<ExportValue> {
        self.find_as(SearchKind::Find, filter, Strictness::Strict)
    }

    /// Subscribes under the search kind the filter implies, so history
    /// reads `findByProps(..)` rather than `find(..)`.
    pub fn lookup(&self, filter: Filter) -> Deferred<ExportValue> {
        let kind = filter.kind();
        self.find_as(kind, filter, Strictness::Strict)
    }

    pub fn find_with(&self, filter: Filter, strictness: Strictness) -> Deferred<ExportValue> {
        self.find_as(SearchKind::Find, filter, strictness)
    }

    pub fn find_by_props<I, S>(&self, props: I) -> Result<Deferred<ExportValue>, LazyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.find_as(SearchKind::FindByProps, Filter::by_props(props)?, Strictness::Strict))
    }

    /// The value of a single export property, found by that property's name.
    pub fn find_prop(&self, prop: &str) -> Result<Deferred<ExportValue>, LazyError> {
        let owner = self.find_by_props([prop])?;
        let key = prop.to_string();
        Ok(owner.map(move |value| value.prop(&key).cloned().unwrap_or_else(ExportValue::null)))
    }

    pub fn find_by_code<I, F>(&self, code: I) -> Result<Deferred<ExportValue>, LazyError>
    where
        I: IntoIterator<Item = F>,
        F: Into<CodeFragment>,
    {
        Ok(self.find_as(SearchKind::FindByCode, Filter::by_code(code)?, Strictness::Strict))
    }

    pub fn find_store(&self, name: &str) -> Result<Deferred<ExportValue>, LazyError> {
        Ok(self.find_as(SearchKind::FindStore, Filter::by_store_name(name)?, Strictness::Strict))
    }

    pub fn find_by_factory_code<I, F>(&self, code: I) -> Result<Deferred<ExportValue>, LazyError>
    where
        I: IntoIterator<Item = F>,
        F: Into<CodeFragment>,
    {
        Ok(self.find_as(SearchKind::FindByFactoryCode, Filter::by_factory_code(code)?, Strictness::Strict))
    }

    pub fn find_component_by_code<I, F>(&self, code: I) -> Result<Deferred<ExportValue>, LazyError>
    where
        I: IntoIterator<Item = F>,
        F: Into<CodeFragment>,
    {
        Ok(self.find_as(
            SearchKind::FindComponentByCode,
            Filter::component_by_code(code)?,
            Strictness::Strict,
        ))
    }

    pub fn map_mangled_module(
        &self,
        code: Vec<CodeFragment>,
        mappers: IndexMap<String, Filter>,
    ) -> Result<Deferred<IndexMap<String, ExportValue>>, LazyError> {
        if mappers.is_empty() {
            return Err(LazyError::MalformedCriteria("mapMangledModule needs at least one mapper".to_string()));
        }
        let factory = Filter::by_factory_code(code.clone())?;
        let criteria = SearchCriteria::Mangled {
            code,
            mappers: mappers.clone(),
        };
        let deferred = Deferred::pending(
            format!("{}({})", SearchKind::MapMangledModule, criteria.describe()),
            Strictness::Strict,
        );
        self.record(SearchKind::MapMangledModule, criteria);

        let target = deferred.clone();
        let failing = deferred.clone();
        self.subscribe(
            factory,
            Box::new(move |root, _| {
                target.resolve(map_exports(&root, &mappers));
            }),
            Some(Box::new(move |reason| {
                failing.fail(reason);
            })),
        );
        Ok(deferred)
    }

    pub fn dependant_lazy<T, F>(&self, label: impl Into<String>, factory: F, attempts: usize) -> DependantLazy<T>
    where
        T: Clone + 'static,
        F: Fn(&LazyRegistry) -> Option<T> + 'static,
    {
        let label = label.into();
        let factory: LazyFactory<T> = Rc::new(factory);
        let check_factory = Rc::clone(&factory);
        self.record(
            SearchKind::DependantLazy,
            SearchCriteria::Dependant {
                label: label.clone(),
                check: Rc::new(move |registry| check_factory(registry).is_some()),
            },
        );
        DependantLazy::new(label, self.clone(), factory, attempts)
    }

    /// First executed module the filter accepts, without subscribing.
    pub fn cache_find(&self, filter: &Filter) -> Option<(ExportValue, ModuleId)> {
        let signature = filter.signature();
        let mut state = self.state.borrow_mut();
        if let Some(hit) = state.cache.get(&signature) {
            return Some(hit.clone());
        }

        let key_limit = state.key_limit;
        let found = state
            .observed
            .iter()
            .find_map(|m| match_module(filter, m, key_limit).map(|v| (v, m.id.clone())));
        if let Some(hit) = &found {
            state.cache.insert(signature, hit.clone());
        }
        found
    }

    pub fn cache_find_all(&self, filter: &Filter) -> Vec<(ExportValue, ModuleId)> {
        let state = self.state.borrow();
        let mut out = Vec::new();
        for module in &state.observed {
            if filter.targets_factory() {
                if filter.test_factory(&module.source) {
                    out.push((module.exports.root().clone(), module.id.clone()));
                }
                continue;
            }
            for (_, value) in module.exports.candidates(state.key_limit) {
                if filter.test(value) {
                    out.push((value.clone(), module.id.clone()));
                }
            }
        }
        out
    }

    /// Re-runs a recorded search against everything executed so far.
    /// `None` for searches this registry cannot answer alone.
    pub fn replay_entry(&self, entry: &HistoryEntry) -> Option<bool> {
        match &entry.criteria {
            SearchCriteria::Filter(filter) => Some(self.cache_find(filter).is_some()),
            SearchCriteria::Mangled { code, mappers } => {
                let factory = Filter::ByFactoryCode(code.clone());
                let Some((root, _)) = self.cache_find(&factory) else {
                    return Some(false);
                };
                let mapped = map_exports(&root, mappers);
                let missing = unmapped(&mapped, mappers);
                if !missing.is_empty() {
                    debug!(target: "lazy", "mapMangledModule left {} unmapped", missing.join(", "));
                }
                Some(missing.is_empty())
            }
            SearchCriteria::Dependant { check, .. } => Some(check(self)),
            SearchCriteria::Code(_) | SearchCriteria::ExtractAndLoad { .. } => None,
        }
    }

    /// Fails every subscription still waiting. Returns how many there were.
    pub fn fail_pending(&self, reason: &str) -> usize {
        let pending = std::mem::take(&mut self.state.borrow_mut().subscriptions);
        let count = pending.len();
        for sub in pending {
            if let Some(on_fail) = sub.on_fail {
                on_fail(reason);
            }
        }
        count
    }

    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.observed.clear();
        state.queue.clear();
        state.subscriptions.clear();
        state.cache.clear();
        state.history.clear();
        state.draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::deferred::ExportAccess;
    use std::cell::Cell;

    fn registry() -> LazyRegistry {
        LazyRegistry::new(3, true)
    }

    fn module_with(prop: &str) -> ModuleExports {
        ModuleExports::new(ExportValue::object(vec![(prop, ExportValue::function("function(){}"))]))
    }

    fn observe(reg: &LazyRegistry, id: &str, exports: ModuleExports) {
        reg.notify_observed(ModuleId::from(id), exports, format!("module {}", id));
        reg.drain();
    }

    #[test]
    fn test_by_props_waits_then_forwards() {
        let reg = registry();
        let found = reg.find_by_props(["fooExport"]).unwrap();
        assert!(!found.is_resolved());
        assert!(found.prop("fooExport").is_err());

        observe(&reg, "1", module_with("other"));
        assert!(!found.is_resolved());

        observe(&reg, "2", module_with("fooExport"));
        assert!(found.is_resolved());
        assert!(found.prop("fooExport").unwrap().is_some());
    }

    #[test]
    fn test_find_prop_forwards_the_property() {
        let reg = registry();
        let prop = reg.find_prop("fooExport").unwrap();
        assert!(prop.get().is_err());

        observe(&reg, "1", module_with("fooExport"));
        assert_eq!(prop.get().unwrap(), ExportValue::function("function(){}"));
    }

    #[test]
    fn test_component_found_through_wrapper() {
        let reg = registry();
        let found = reg.find_component_by_code(["BTN_MARKER"]).unwrap();

        let wrapped = ExportValue::Component {
            source: "memo(e)".to_string(),
            inner: Some(Box::new(ExportValue::function("function(){return BTN_MARKER}"))),
        };
        observe(&reg, "1", ModuleExports::new(ExportValue::object(vec![("Z", wrapped.clone())])));

        assert!(found.is_resolved());
        assert_eq!(found.get().unwrap(), wrapped);
    }

    #[test]
    fn test_lenient_placeholder_noops_while_pending() {
        let reg = registry();
        let found = reg.find_with(Filter::by_props(["fooExport"]).unwrap(), Strictness::Lenient);
        assert_eq!(found.with(|_| 1).unwrap(), None);

        observe(&reg, "1", module_with("fooExport"));
        assert_eq!(found.with(|_| 1).unwrap(), Some(1));
    }

    #[test]
    fn test_late_query_resolves_synchronously() {
        let reg = registry();
        observe(&reg, "1", module_with("fooExport"));
        let found = reg.find_by_props(["fooExport"]).unwrap();
        assert!(found.is_resolved());
        assert_eq!(reg.pending_count(), 0);
    }

    #[test]
    fn test_first_observed_module_wins() {
        let reg = registry();
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        reg.wait_for(Filter::by_props(["x"]).unwrap(), move |_, id| *s.borrow_mut() = Some(id));

        reg.notify_observed(ModuleId::from("a"), module_with("x"), String::new());
        reg.notify_observed(ModuleId::from("b"), module_with("x"), String::new());
        reg.drain();
        assert_eq!(*seen.borrow(), Some(ModuleId::from("a")));
    }

    #[test]
    fn test_default_and_short_named_exports() {
        let reg = registry();
        let nested = ModuleExports::new(ExportValue::object(vec![
            ("default", ExportValue::object(vec![("inDefault", ExportValue::function("f"))])),
            ("Q", ExportValue::object(vec![("inNamed", ExportValue::function("g"))])),
            ("longKey", ExportValue::object(vec![("tooDeep", ExportValue::function("h"))])),
        ]));
        observe(&reg, "1", nested);
        assert!(reg.cache_find(&Filter::by_props(["inDefault"]).unwrap()).is_some());
        assert!(reg.cache_find(&Filter::by_props(["inNamed"]).unwrap()).is_some());
        assert!(reg.cache_find(&Filter::by_props(["tooDeep"]).unwrap()).is_none());
    }

    #[test]
    fn test_callback_may_subscribe_during_drain() {
        let reg = registry();
        let inner_hit = Rc::new(Cell::new(false));
        let hit = inner_hit.clone();
        let nested = reg.clone();
        reg.wait_for(Filter::by_props(["first"]).unwrap(), move |_, _| {
            nested.wait_for(Filter::by_props(["second"]).unwrap(), move |_, _| hit.set(true));
        });
        observe(&reg, "1", module_with("first"));
        assert!(!inner_hit.get());
        observe(&reg, "2", module_with("second"));
        assert!(inner_hit.get());
    }

    #[test]
    fn test_factory_code_filter_sees_source() {
        let reg = registry();
        let found = reg.find_by_factory_code(["SECRET_MARKER"]).unwrap();
        reg.notify_observed(ModuleId::from("7"), module_with("x"), "var a=SECRET_MARKER".to_string());
        reg.drain();
        assert!(found.get().unwrap().has_props(&["x"]));
    }

    #[test]
    fn test_map_mangled_module() {
        let reg = registry();
        let mut mappers = IndexMap::new();
        mappers.insert("open".to_string(), Filter::by_code(["openModal"]).unwrap());
        let mapped = reg.map_mangled_module(vec![CodeFragment::text("MODAL_KEY")], mappers).unwrap();
        let exports = ModuleExports::new(ExportValue::object(vec![("Zx", ExportValue::function("openModal()"))]));
        reg.notify_observed(ModuleId::from("3"), exports, "MODAL_KEY".to_string());
        reg.drain();
        assert!(mapped.get().unwrap().contains_key("open"));
        assert_eq!(reg.replay_entry(&reg.history()[0]), Some(true));
    }

    #[test]
    fn test_dependant_lazy_attempts() {
        let reg = registry();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let lazy = reg.dependant_lazy(
            "settings",
            move |r: &LazyRegistry| {
                c.set(c.get() + 1);
                r.cache_find(&Filter::by_props(["settings"]).unwrap()).map(|(v, _)| v)
            },
            2,
        );
        assert!(matches!(lazy.get(), Err(LazyError::NotYetAvailable { .. })));
        observe(&reg, "1", module_with("settings"));
        assert!(lazy.get().is_ok());
        assert!(lazy.get().is_ok());
        assert_eq!(calls.get(), 2);

        let never = reg.dependant_lazy("never", |_: &LazyRegistry| None::<u32>, 1);
        assert!(never.get().is_err());
        assert!(matches!(never.get(), Err(LazyError::AttemptsExhausted { attempts: 1 })));
    }

    #[test]
    fn test_history_and_replay() {
        let reg = registry();
        let _ = reg.find_store("UserStore").unwrap();
        let _ = reg.find_by_code(["neverThere"]).unwrap();
        observe(
            &reg,
            "1",
            ModuleExports::new(ExportValue::Store {
                name: "UserStore".to_string(),
                props: Default::default(),
            }),
        );
        let history = reg.history();
        assert_eq!(history.len(), 2);
        assert_eq!(reg.replay_entry(&history[0]), Some(true));
        assert_eq!(reg.replay_entry(&history[1]), Some(false));
    }

    #[test]
    fn test_fail_pending_marks_failed() {
        let reg = registry();
        let found = reg.find_by_props(["ghost"]).unwrap();
        assert_eq!(reg.fail_pending("crawl finished"), 1);
        assert!(found.is_failed());
        assert_eq!(reg.pending_count(), 0);
    }

    #[test]
    fn test_cache_find_all_and_reset() {
        let reg = registry();
        observe(&reg, "1", module_with("shared"));
        observe(&reg, "2", module_with("shared"));
        assert_eq!(reg.cache_find_all(&Filter::by_props(["shared"]).unwrap()).len(), 2);
        reg.reset();
        assert_eq!(reg.observed_count(), 0);
        assert!(reg.cache_find(&Filter::by_props(["shared"]).unwrap()).is_none());
    }
}
