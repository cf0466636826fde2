// Tue Jan 13 2026 - Alex

use crate::pattern::fragment::{all_match, CodeFragment};
use crate::registry::{ModuleExports, ModuleId, ModuleRecord};
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptOutcome {
    /// First sighting; the record now exists.
    Captured,
    /// The id was intercepted before; the existing record is untouched.
    Duplicate,
    /// Source text could not be captured; the host runs the factory as shipped.
    PassThrough,
}

/// Every module factory the host was about to run, in the order it was seen.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<ModuleId, ModuleRecord>,
    strip_newlines: bool,
    capture_failures: usize,
}

impl ModuleRegistry {
    pub fn new(strip_newlines: bool) -> Self {
        Self {
            modules: IndexMap::new(),
            strip_newlines,
            capture_failures: 0,
        }
    }

    pub fn intercept(&mut self, id: &ModuleId, factory: &[u8]) -> InterceptOutcome {
        if self.modules.contains_key(id) {
            debug!(target: "registry", "Module {} intercepted again", id);
            return InterceptOutcome::Duplicate;
        }

        let text = match std::str::from_utf8(factory) {
            Ok(text) => text,
            Err(e) => {
                self.capture_failures += 1;
                warn!(target: "registry", "Could not capture source of module {}: {}", id, e);
                return InterceptOutcome::PassThrough;
            }
        };

        let source = if self.strip_newlines {
            text.replace('\n', "")
        } else {
            text.to_string()
        };

        let sequence = self.modules.len();
        self.modules
            .insert(id.clone(), ModuleRecord::new(id.clone(), source, sequence));
        InterceptOutcome::Captured
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn set_patched(&mut self, id: &ModuleId, source: String, applied: IndexSet<String>) {
        if let Some(record) = self.modules.get_mut(id) {
            record.patched_source = Some(source);
            record.applied_patches.extend(applied);
        }
    }

    pub fn mark_resolved(&mut self, id: &ModuleId, exports: ModuleExports) {
        if let Some(record) = self.modules.get_mut(id) {
            record.resolved = true;
            record.exports = Some(exports);
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn capture_failures(&self) -> usize {
        self.capture_failures
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    /// Ids observed at or after `cursor`, plus the cursor to resume from.
    pub fn observed_since(&self, cursor: usize) -> (Vec<ModuleId>, usize) {
        let ids = self
            .modules
            .keys()
            .skip(cursor)
            .cloned()
            .collect::<Vec<_>>();
        (ids, self.modules.len())
    }

    pub fn unexecuted(&self) -> Vec<ModuleId> {
        self.modules
            .values()
            .filter(|r| !r.resolved)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Every module whose source contains all the fragments. Searches see the
    /// source as shipped, never a patched rewrite.
    pub fn search(&self, fragments: &[CodeFragment]) -> Vec<&ModuleRecord> {
        self.modules
            .values()
            .filter(|r| all_match(r.raw_source(), fragments))
            .collect()
    }

    pub fn find_module_id(&self, fragments: &[CodeFragment]) -> Option<ModuleId> {
        let found = self
            .modules
            .values()
            .find(|r| all_match(r.raw_source(), fragments))
            .map(|r| r.id.clone());

        if found.is_none() {
            let described: Vec<String> = fragments.iter().map(|f| f.to_string()).collect();
            warn!(target: "registry", "Couldn't find module matching {}", described.join(", "));
        }
        found
    }

    pub fn reset(&mut self) {
        self.modules.clear();
        self.capture_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::from(s)
    }

    #[test]
    fn test_intercept_strips_newlines() {
        let mut registry = ModuleRegistry::new(true);
        assert_eq!(registry.intercept(&id("1"), b"a\nb"), InterceptOutcome::Captured);
        assert_eq!(registry.get(&id("1")).unwrap().raw_source(), "ab");
    }

    #[test]
    fn test_duplicate_keeps_raw_source() {
        let mut registry = ModuleRegistry::new(false);
        registry.intercept(&id("1"), b"first");
        assert_eq!(registry.intercept(&id("1"), b"second"), InterceptOutcome::Duplicate);
        assert_eq!(registry.get(&id("1")).unwrap().raw_source(), "first");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_bad_encoding_passes_through() {
        let mut registry = ModuleRegistry::new(true);
        assert_eq!(registry.intercept(&id("9"), &[0xff, 0xfe]), InterceptOutcome::PassThrough);
        assert!(!registry.contains(&id("9")));
        assert_eq!(registry.capture_failures(), 1);
    }

    #[test]
    fn test_observed_since_cursor() {
        let mut registry = ModuleRegistry::new(true);
        registry.intercept(&id("a"), b"1");
        registry.intercept(&id("b"), b"2");
        let (first, cursor) = registry.observed_since(0);
        assert_eq!(first, vec![id("a"), id("b")]);
        registry.intercept(&id("c"), b"3");
        let (rest, cursor) = registry.observed_since(cursor);
        assert_eq!(rest, vec![id("c")]);
        assert_eq!(cursor, 3);
    }

    #[test]
    fn test_search_ignores_patched_source() {
        let mut registry = ModuleRegistry::new(true);
        registry.intercept(&id("1"), b"foo()");
        registry.intercept(&id("2"), b"bar()");
        registry.set_patched(&id("2"), "bar();foo()".to_string(), IndexSet::new());

        let hits: Vec<_> = registry
            .search(&[CodeFragment::text("foo")])
            .into_iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(hits, vec![id("1")]);
        assert_eq!(registry.get(&id("2")).unwrap().effective_source(), "bar();foo()");
        assert_eq!(registry.find_module_id(&[CodeFragment::text("bar")]), Some(id("2")));
        assert_eq!(registry.find_module_id(&[CodeFragment::text("baz")]), None);
    }

    #[test]
    fn test_unexecuted_and_reset() {
        let mut registry = ModuleRegistry::new(true);
        registry.intercept(&id("1"), b"x");
        registry.intercept(&id("2"), b"y");
        registry.mark_resolved(&id("1"), ModuleExports::empty());
        assert_eq!(registry.unexecuted(), vec![id("2")]);
        registry.reset();
        assert!(registry.is_empty());
    }
}
