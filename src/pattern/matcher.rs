// Tue Jan 13 2026 - Alex

use crate::pattern::fragment::CodeFragment;
use crate::pattern::PatternError;

/// A find criterion is a single fragment tested against raw module source.
pub type FindCriterion = CodeFragment;

pub trait TextMatcher {
    fn matches(&self, text: &str) -> bool;
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub output: String,
    /// How many places the rule's pattern matched, whether or not every
    /// one of them was substituted.
    pub occurrences: usize,
}

impl Rewrite {
    pub fn unchanged(text: &str) -> Self {
        Self {
            output: text.to_string(),
            occurrences: 0,
        }
    }

    pub fn changed(&self, input: &str) -> bool {
        self.output != input
    }
}

pub trait TextRewriter {
    fn apply(&self, text: &str) -> Result<Rewrite, PatternError>;
    fn describe(&self) -> String;
}

impl TextMatcher for CodeFragment {
    fn matches(&self, text: &str) -> bool {
        CodeFragment::matches(self, text)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl<T: TextMatcher + ?Sized> TextMatcher for Box<T> {
    fn matches(&self, text: &str) -> bool {
        (**self).matches(text)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
