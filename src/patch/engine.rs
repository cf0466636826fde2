// Tue Jan 13 2026 - Alex

use crate::patch::descriptor::{PatchDescriptor, PredicateMiss};
use crate::patch::ledger::{BadPatch, BadPatchKind, LedgerEntry, PatchLedger, RuleRecord};
use crate::patch::PatchError;
use crate::registry::ModuleId;
use crate::utils::{format_duration, measure_time};
use indexmap::IndexSet;
use log::{debug, error, warn};
use std::collections::HashSet;
use std::time::Duration;

/// Result of running every descriptor over one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// `None` when no descriptor left a change behind.
    pub source: Option<String>,
    pub applied: IndexSet<String>,
}

struct Slot {
    descriptor: PatchDescriptor,
    found: bool,
    consumed: bool,
}

/// Applies registered descriptors to module source in registration order.
pub struct PatchEngine {
    slots: Vec<Slot>,
    ledger: PatchLedger,
    done: HashSet<(usize, ModuleId)>,
    slow_threshold: Duration,
    bootstrap_failure: Option<String>,
}

impl PatchEngine {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            slots: Vec::new(),
            ledger: PatchLedger::new(),
            done: HashSet::new(),
            slow_threshold,
            bootstrap_failure: None,
        }
    }

    pub fn register(&mut self, descriptor: PatchDescriptor) -> usize {
        debug!(target: "patcher", "Registered patch by {} for {}", descriptor.owner, descriptor.describe_find());
        self.slots.push(Slot {
            descriptor,
            found: false,
            consumed: false,
        });
        self.slots.len() - 1
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), PatchError> {
        let slot = self.slots.get_mut(index).ok_or(PatchError::UnknownPatch(index))?;
        slot.descriptor.enabled = enabled;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn descriptor(&self, index: usize) -> Option<&PatchDescriptor> {
        self.slots.get(index).map(|s| &s.descriptor)
    }

    pub fn ledger(&self) -> &PatchLedger {
        &self.ledger
    }

    fn label(index: usize, owner: &str) -> String {
        format!("{}#{}", owner, index)
    }

    pub fn apply_patches(&mut self, id: &ModuleId, raw: &str) -> PatchOutcome {
        let mut code = raw.to_string();
        let mut applied = IndexSet::new();

        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            let descriptor = &slot.descriptor;

            if !descriptor.enabled || slot.consumed {
                continue;
            }
            if self.done.contains(&(index, id.clone())) {
                continue;
            }
            if !descriptor.find.matches(raw) {
                continue;
            }

            if let Some(predicate) = &descriptor.predicate {
                if !predicate(id) {
                    if descriptor.predicate_miss == PredicateMiss::CountsAsFound {
                        slot.found = true;
                    }
                    continue;
                }
            }

            slot.found = true;
            let before = code.clone();
            let mut entry = LedgerEntry {
                descriptor: index,
                owner: descriptor.owner.clone(),
                module: id.clone(),
                rules: Vec::with_capacity(descriptor.rules.len()),
                reverted: false,
                no_warn: descriptor.no_warn,
            };

            for rule in &descriptor.rules {
                let pattern = rule.describe();
                if !rule.is_open() {
                    entry.rules.push(RuleRecord {
                        pattern,
                        expected: rule.expected(),
                        occurrences: 0,
                        error: None,
                        elapsed: Duration::ZERO,
                        skipped: true,
                    });
                    continue;
                }

                let (result, elapsed) = measure_time(|| rule.rewriter().apply(&code));

                if elapsed > self.slow_threshold {
                    warn!(target: "patcher", "Patch by {} took {} (Module id is {}): {}",
                        descriptor.owner, format_duration(elapsed), id, pattern);
                }

                match result {
                    Ok(rewrite) => {
                        let wrong = rewrite.occurrences != rule.expected();
                        if wrong && !(descriptor.no_warn && rewrite.occurrences == 0) {
                            warn!(target: "patcher", "Patch by {} had wrong count (Module id is {}): {} expected {}, found {}",
                                descriptor.owner, id, pattern, rule.expected(), rewrite.occurrences);
                        }
                        entry.rules.push(RuleRecord {
                            pattern: pattern.clone(),
                            expected: rule.expected(),
                            occurrences: rewrite.occurrences,
                            error: None,
                            elapsed,
                            skipped: false,
                        });

                        if wrong && descriptor.group {
                            warn!(target: "patcher", "Undoing patch group {} by {} because replacement {} had wrong count",
                                descriptor.describe_find(), descriptor.owner, pattern);
                            code = before.clone();
                            entry.reverted = true;
                            break;
                        }
                        code = rewrite.output;
                    }
                    Err(e) => {
                        error!(target: "patcher", "Patch by {} errored (Module id is {}): {}: {}",
                            descriptor.owner, id, pattern, e);
                        entry.rules.push(RuleRecord {
                            pattern,
                            expected: rule.expected(),
                            occurrences: 0,
                            error: Some(e.to_string()),
                            elapsed,
                            skipped: false,
                        });
                        code = before.clone();
                        entry.reverted = true;
                        break;
                    }
                }
            }

            if descriptor.bootstrap && !entry.is_clean() && self.bootstrap_failure.is_none() {
                self.bootstrap_failure = Some(format!(
                    "Bootstrap patch by {} failed on module {}",
                    descriptor.owner, id
                ));
            }

            if !entry.reverted && code != before {
                applied.insert(Self::label(index, &descriptor.owner));
            }
            if !descriptor.all {
                slot.consumed = true;
            }

            self.ledger.record(entry);
            self.done.insert((index, id.clone()));
        }

        let source = if code == raw { None } else { Some(code) };
        PatchOutcome { source, applied }
    }

    /// Enabled descriptors that never found a module.
    pub fn unfound(&self) -> Vec<BadPatch> {
        self.slots
            .iter()
            .filter(|s| s.descriptor.enabled && !s.found)
            .map(|s| BadPatch {
                owner: s.descriptor.owner.clone(),
                kind: BadPatchKind::Unfound,
                module: None,
                pattern: s.descriptor.describe_find(),
                detail: None,
            })
            .collect()
    }

    pub fn bad_patches(&self) -> Vec<BadPatch> {
        self.ledger.bad_patches()
    }

    pub fn slow_patches(&self) -> Vec<BadPatch> {
        self.ledger.slow_patches(self.slow_threshold)
    }

    /// Set once a bootstrap descriptor errors or miscounts.
    pub fn bootstrap_failure(&self) -> Option<&str> {
        self.bootstrap_failure.as_deref()
    }

    /// Bootstrap descriptors still waiting for their module.
    pub fn pending_bootstrap(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.descriptor.bootstrap && s.descriptor.enabled && !s.found)
            .map(|s| s.descriptor.owner.clone())
            .collect()
    }

    pub fn reset(&mut self) {
        self.slots.clear();
        self.ledger.clear();
        self.done.clear();
        self.bootstrap_failure = None;
    }
}
