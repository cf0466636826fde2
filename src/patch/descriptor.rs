// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::patch::PatchError;
use crate::pattern::{cache, CodeFragment, FindCriterion, RegexRewrite, Replacement, TextMatcher, TextRewriter};
use crate::registry::ModuleId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

pub type ModulePredicate = Rc<dyn Fn(&ModuleId) -> bool>;
pub type RuleGate = Rc<dyn Fn() -> bool>;

fn one() -> usize {
    1
}

/// A rule as written in an extension manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "match")]
    pub pattern: String,
    pub replace: String,
    #[serde(default)]
    pub global: bool,
    #[serde(default = "one")]
    pub expected: usize,
}

/// A patch as written in an extension manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSpec {
    pub find: String,
    #[serde(default)]
    pub find_regex: bool,
    pub replacement: Vec<RuleSpec>,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub no_warn: bool,
}

/// What a descriptor whose module predicate rejects a matching module
/// counts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredicateMiss {
    /// The find matched, so the descriptor is not reported as unfound.
    CountsAsFound,
    /// The descriptor keeps waiting for a module the predicate accepts.
    #[default]
    StaysPending,
}

pub struct PatchRule {
    rewriter: Rc<dyn TextRewriter>,
    expected: usize,
    gate: Option<RuleGate>,
}

impl PatchRule {
    pub fn new(rewriter: Rc<dyn TextRewriter>) -> Self {
        Self {
            rewriter,
            expected: 1,
            gate: None,
        }
    }

    pub fn with_expected(mut self, expected: usize) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_gate(mut self, gate: RuleGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn rewriter(&self) -> &dyn TextRewriter {
        self.rewriter.as_ref()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn is_open(&self) -> bool {
        self.gate.as_ref().map_or(true, |g| g())
    }

    pub fn describe(&self) -> String {
        self.rewriter.describe()
    }
}

impl fmt::Debug for PatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRule")
            .field("rewriter", &self.rewriter.describe())
            .field("expected", &self.expected)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}

pub struct PatchDescriptor {
    pub owner: String,
    pub find: FindCriterion,
    pub rules: Vec<PatchRule>,
    pub all: bool,
    pub group: bool,
    pub no_warn: bool,
    pub bootstrap: bool,
    pub enabled: bool,
    pub predicate: Option<ModulePredicate>,
    pub predicate_miss: PredicateMiss,
}

impl PatchDescriptor {
    pub fn new(owner: impl Into<String>, find: FindCriterion) -> Self {
        Self {
            owner: owner.into(),
            find,
            rules: Vec::new(),
            all: false,
            group: false,
            no_warn: false,
            bootstrap: false,
            enabled: true,
            predicate: None,
            predicate_miss: PredicateMiss::default(),
        }
    }

    pub fn with_rule(mut self, rule: PatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    pub fn with_group(mut self, group: bool) -> Self {
        self.group = group;
        self
    }

    pub fn with_no_warn(mut self, no_warn: bool) -> Self {
        self.no_warn = no_warn;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_predicate(mut self, predicate: ModulePredicate, on_miss: PredicateMiss) -> Self {
        self.predicate = Some(predicate);
        self.predicate_miss = on_miss;
        self
    }

    /// Builds a descriptor from its manifest form. `$self` in replacements
    /// resolves against the owner.
    pub fn from_spec(owner: &str, spec: &PatchSpec, config: &Config) -> Result<Self, PatchError> {
        if spec.find.is_empty() {
            return Err(PatchError::EmptyFind { owner: owner.to_string() });
        }
        if spec.replacement.is_empty() {
            return Err(PatchError::NoRules { owner: owner.to_string() });
        }

        let find = if spec.find_regex {
            CodeFragment::pattern(&spec.find).map_err(|source| PatchError::InvalidFind {
                owner: owner.to_string(),
                source,
            })?
        } else {
            CodeFragment::text(spec.find.clone())
        };

        let self_reference = config.self_reference(owner);
        let mut descriptor = PatchDescriptor::new(owner, find)
            .with_all(spec.all)
            .with_group(spec.group)
            .with_no_warn(spec.no_warn);

        for (index, rule) in spec.replacement.iter().enumerate() {
            if rule.expected == 0 {
                return Err(PatchError::ZeroExpected {
                    owner: owner.to_string(),
                    index,
                });
            }
            let regex = cache::compile(&rule.pattern).map_err(|source| PatchError::InvalidRule {
                owner: owner.to_string(),
                index,
                source,
            })?;
            let rewrite = RegexRewrite::new(regex, Replacement::template(rule.replace.clone()))
                .with_global(rule.global)
                .with_self_reference(self_reference.clone());
            descriptor = descriptor.with_rule(PatchRule::new(Rc::new(rewrite)).with_expected(rule.expected));
        }

        Ok(descriptor)
    }

    pub fn describe_find(&self) -> String {
        self.find.describe()
    }
}

impl fmt::Debug for PatchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchDescriptor")
            .field("owner", &self.owner)
            .field("find", &self.find.to_string())
            .field("rules", &self.rules)
            .field("all", &self.all)
            .field("group", &self.group)
            .field("bootstrap", &self.bootstrap)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(find: &str, rules: Vec<RuleSpec>) -> PatchSpec {
        PatchSpec {
            find: find.to_string(),
            find_regex: false,
            replacement: rules,
            all: false,
            group: false,
            no_warn: false,
        }
    }

    fn rule(pattern: &str, replace: &str) -> RuleSpec {
        RuleSpec {
            pattern: pattern.to_string(),
            replace: replace.to_string(),
            global: false,
            expected: 1,
        }
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: PatchSpec = serde_json::from_str(
            r#"{"find":"FOO_MARKER","replacement":[{"match":"BAR=1","replace":"BAR=2"}]}"#,
        )
        .unwrap();
        assert_eq!(spec.replacement[0].expected, 1);
        assert!(!spec.all);
    }

    #[test]
    fn test_from_spec_rejects_bad_input() {
        let config = Config::default();
        assert!(matches!(
            PatchDescriptor::from_spec("A", &spec("", vec![rule("x", "y")]), &config),
            Err(PatchError::EmptyFind { .. })
        ));
        assert!(matches!(
            PatchDescriptor::from_spec("A", &spec("x", vec![]), &config),
            Err(PatchError::NoRules { .. })
        ));
        assert!(matches!(
            PatchDescriptor::from_spec("A", &spec("x", vec![rule("(", "y")]), &config),
            Err(PatchError::InvalidRule { index: 0, .. })
        ));
    }

    #[test]
    fn test_from_spec_builds_rules_in_order() {
        let config = Config::default();
        let d = PatchDescriptor::from_spec("A", &spec("x", vec![rule("a", "b"), rule("c", "d")]), &config).unwrap();
        let described: Vec<_> = d.rules.iter().map(|r| r.describe()).collect();
        assert_eq!(described, vec!["/a/", "/c/"]);
        assert_eq!(d.describe_find(), "\"x\"");
    }
}
