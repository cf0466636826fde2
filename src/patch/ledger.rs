// Tue Jan 13 2026 - Alex

use crate::registry::ModuleId;
use crate::utils::format_duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    pub pattern: String,
    pub expected: usize,
    pub occurrences: usize,
    pub error: Option<String>,
    pub elapsed: Duration,
    /// The rule's gate was closed, so it never ran.
    pub skipped: bool,
}

impl RuleRecord {
    pub fn is_wrong_count(&self) -> bool {
        !self.skipped && self.error.is_none() && self.occurrences != self.expected
    }
}

/// What one descriptor did to one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub descriptor: usize,
    pub owner: String,
    pub module: ModuleId,
    pub rules: Vec<RuleRecord>,
    pub reverted: bool,
    pub no_warn: bool,
}

impl LedgerEntry {
    pub fn errored(&self) -> Option<&RuleRecord> {
        self.rules.iter().find(|r| r.error.is_some())
    }

    pub fn wrong_counts(&self) -> impl Iterator<Item = &RuleRecord> {
        self.rules.iter().filter(|r| r.is_wrong_count())
    }

    pub fn is_clean(&self) -> bool {
        self.errored().is_none() && self.wrong_counts().next().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadPatchKind {
    WrongCount,
    Errored,
    Unfound,
    Slow,
}

impl BadPatchKind {
    pub fn phrase(&self) -> &'static str {
        match self {
            BadPatchKind::WrongCount => "had wrong count",
            BadPatchKind::Errored => "errored",
            BadPatchKind::Unfound => "found no module",
            BadPatchKind::Slow => "was slow",
        }
    }

    pub fn from_phrase(phrase: &str) -> Option<Self> {
        match phrase {
            "had wrong count" => Some(BadPatchKind::WrongCount),
            "errored" => Some(BadPatchKind::Errored),
            "found no module" => Some(BadPatchKind::Unfound),
            "was slow" => Some(BadPatchKind::Slow),
            _ => None,
        }
    }
}

impl fmt::Display for BadPatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadPatch {
    pub owner: String,
    pub kind: BadPatchKind,
    pub module: Option<ModuleId>,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Default)]
pub struct PatchLedger {
    entries: Vec<LedgerEntry>,
}

impl PatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn entries_for(&self, module: &ModuleId) -> impl Iterator<Item = &LedgerEntry> {
        let module = module.clone();
        self.entries.iter().filter(move |e| e.module == module)
    }

    /// One finding per descriptor per module. An error outranks a count
    /// mismatch; zero-effect rules of `no_warn` descriptors are not findings.
    pub fn bad_patches(&self) -> Vec<BadPatch> {
        let mut out = Vec::new();

        for entry in &self.entries {
            if let Some(rule) = entry.errored() {
                out.push(BadPatch {
                    owner: entry.owner.clone(),
                    kind: BadPatchKind::Errored,
                    module: Some(entry.module.clone()),
                    pattern: rule.pattern.clone(),
                    detail: rule.error.clone(),
                });
                continue;
            }

            let offending: Vec<&RuleRecord> = entry
                .wrong_counts()
                .filter(|r| !(entry.no_warn && r.occurrences == 0))
                .collect();
            let Some(first) = offending.first() else { continue };

            let mut detail = format!("expected {}, found {}", first.expected, first.occurrences);
            if offending.len() > 1 {
                detail.push_str(&format!(" (+{} more rules)", offending.len() - 1));
            }
            out.push(BadPatch {
                owner: entry.owner.clone(),
                kind: BadPatchKind::WrongCount,
                module: Some(entry.module.clone()),
                pattern: first.pattern.clone(),
                detail: Some(detail),
            });
        }

        out
    }

    pub fn slow_patches(&self, threshold: Duration) -> Vec<BadPatch> {
        self.entries
            .iter()
            .flat_map(|entry| {
                entry
                    .rules
                    .iter()
                    .filter(move |r| !r.skipped && r.elapsed > threshold)
                    .map(move |r| BadPatch {
                        owner: entry.owner.clone(),
                        kind: BadPatchKind::Slow,
                        module: Some(entry.module.clone()),
                        pattern: r.pattern.clone(),
                        detail: Some(format!("took {}", format_duration(r.elapsed))),
                    })
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(expected: usize, occurrences: usize, error: Option<&str>) -> RuleRecord {
        RuleRecord {
            pattern: "/BAR=1/".to_string(),
            expected,
            occurrences,
            error: error.map(str::to_string),
            elapsed: Duration::from_micros(10),
            skipped: false,
        }
    }

    fn entry(rules: Vec<RuleRecord>, no_warn: bool) -> LedgerEntry {
        LedgerEntry {
            descriptor: 0,
            owner: "Demo".to_string(),
            module: ModuleId::from("7"),
            rules,
            reverted: false,
            no_warn,
        }
    }

    #[test]
    fn test_wrong_count_detail() {
        let mut ledger = PatchLedger::new();
        ledger.record(entry(vec![rule(1, 2, None)], false));
        let bad = ledger.bad_patches();
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].kind, BadPatchKind::WrongCount);
        assert_eq!(bad[0].detail.as_deref(), Some("expected 1, found 2"));
    }

    #[test]
    fn test_one_finding_per_entry() {
        let mut ledger = PatchLedger::new();
        ledger.record(entry(vec![rule(1, 0, None), rule(1, 3, None)], false));
        ledger.record(entry(vec![rule(1, 1, None), rule(1, 1, Some("boom"))], false));
        let bad = ledger.bad_patches();
        assert_eq!(bad.len(), 2);
        assert_eq!(bad[0].detail.as_deref(), Some("expected 1, found 0 (+1 more rules)"));
        assert_eq!(bad[1].kind, BadPatchKind::Errored);
    }

    #[test]
    fn test_no_warn_hides_zero_effect_only() {
        let mut ledger = PatchLedger::new();
        ledger.record(entry(vec![rule(1, 0, None)], true));
        assert!(ledger.bad_patches().is_empty());
        ledger.record(entry(vec![rule(1, 2, None)], true));
        assert_eq!(ledger.bad_patches().len(), 1);
    }

    #[test]
    fn test_slow_is_separate_from_bad() {
        let mut ledger = PatchLedger::new();
        let mut slow = rule(1, 1, None);
        slow.elapsed = Duration::from_millis(20);
        ledger.record(entry(vec![slow], false));
        assert!(ledger.bad_patches().is_empty());
        let slow = ledger.slow_patches(Duration::from_millis(5));
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].kind, BadPatchKind::Slow);
    }

    #[test]
    fn test_phrase_roundtrip() {
        for kind in [BadPatchKind::WrongCount, BadPatchKind::Errored, BadPatchKind::Unfound, BadPatchKind::Slow] {
            assert_eq!(BadPatchKind::from_phrase(kind.phrase()), Some(kind));
        }
    }
}
