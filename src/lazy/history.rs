// Tue Jan 13 2026 - Alex

use crate::lazy::filter::Filter;
use crate::lazy::resolver::LazyRegistry;
use crate::pattern::canonical::uncanonicalize_pattern;
use crate::pattern::{CodeFragment, Regex};
use crate::utils::string::truncate;
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    WaitFor,
    Find,
    FindByProps,
    FindByCode,
    FindStore,
    FindByFactoryCode,
    FindComponentByCode,
    FindModuleFactory,
    MapMangledModule,
    DependantLazy,
    ExtractAndLoadChunks,
}

impl SearchKind {
    pub fn name(&self) -> &'static str {
        match self {
            SearchKind::WaitFor => "waitFor",
            SearchKind::Find => "find",
            SearchKind::FindByProps => "findByProps",
            SearchKind::FindByCode => "findByCode",
            SearchKind::FindStore => "findStore",
            SearchKind::FindByFactoryCode => "findByFactoryCode",
            SearchKind::FindComponentByCode => "findComponentByCode",
            SearchKind::FindModuleFactory => "findModuleFactory",
            SearchKind::MapMangledModule => "mapMangledModule",
            SearchKind::DependantLazy => "webpackDependantLazy",
            SearchKind::ExtractAndLoadChunks => "extractAndLoadChunks",
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type Resolvable = Rc<dyn Fn(&LazyRegistry) -> bool>;

/// The arguments a search was made with. Results are never stored here.
#[derive(Clone)]
pub enum SearchCriteria {
    Filter(Filter),
    Code(Vec<CodeFragment>),
    Mangled {
        code: Vec<CodeFragment>,
        mappers: IndexMap<String, Filter>,
    },
    Dependant {
        label: String,
        check: Resolvable,
    },
    ExtractAndLoad {
        code: Vec<CodeFragment>,
        matcher: Regex,
    },
}

impl SearchCriteria {
    pub fn describe(&self) -> String {
        match self {
            SearchCriteria::Filter(filter) => filter.signature(),
            SearchCriteria::Code(code) => code.iter().join(", "),
            SearchCriteria::Mangled { code, mappers } => format!(
                "{}, {{{}}}",
                code.iter().join(", "),
                mappers
                    .iter()
                    .map(|(name, filter)| format!("{}: {}", name, filter.signature()))
                    .join(", ")
            ),
            SearchCriteria::Dependant { label, .. } => label.clone(),
            SearchCriteria::ExtractAndLoad { code, matcher } => format!(
                "[{}], /{}/",
                code.iter().join(", "),
                uncanonicalize_pattern(matcher.as_str())
            ),
        }
    }
}

impl fmt::Debug for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub kind: SearchKind,
    pub criteria: SearchCriteria,
}

impl HistoryEntry {
    /// `kind(criteria)`. Filter searches of a specific kind show only their
    /// arguments, since the kind already names the filter.
    pub fn describe(&self, max_len: usize) -> String {
        let criteria = match (&self.criteria, self.kind) {
            (SearchCriteria::Filter(filter), kind) if kind != SearchKind::Find && kind != SearchKind::WaitFor => {
                filter.args()
            }
            (criteria, _) => criteria.describe(),
        };
        format!("{}({})", self.kind, truncate(&criteria, max_len))
    }
}

/// Every search call made, in call order.
#[derive(Debug, Default)]
pub struct SearchHistory {
    entries: Vec<HistoryEntry>,
}

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: SearchKind, criteria: SearchCriteria) {
        self.entries.push(HistoryEntry { kind, criteria });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
