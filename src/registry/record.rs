// Tue Jan 13 2026 - Alex

use crate::registry::{ModuleExports, ModuleId};
use indexmap::IndexSet;

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: ModuleId,
    raw_source: String,
    pub patched_source: Option<String>,
    pub applied_patches: IndexSet<String>,
    pub resolved: bool,
    pub exports: Option<ModuleExports>,
    /// Position in observation order, starting at zero.
    pub sequence: usize,
}

impl ModuleRecord {
    pub fn new(id: ModuleId, raw_source: String, sequence: usize) -> Self {
        Self {
            id,
            raw_source,
            patched_source: None,
            applied_patches: IndexSet::new(),
            resolved: false,
            exports: None,
            sequence,
        }
    }

    pub fn raw_source(&self) -> &str {
        &self.raw_source
    }

    /// The text the host will run: patched if any rewrite stuck, raw otherwise.
    pub fn effective_source(&self) -> &str {
        self.patched_source.as_deref().unwrap_or(&self.raw_source)
    }

    pub fn is_patched(&self) -> bool {
        self.patched_source.is_some()
    }
}
