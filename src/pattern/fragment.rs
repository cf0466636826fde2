// Tue Jan 13 2026 - Alex

use crate::pattern::canonical::uncanonicalize_pattern;
use crate::pattern::{cache, PatternError, Regex};
use log::debug;
use std::fmt;

/// One piece of code a search requires: either a literal substring or a
/// regex. Lists of fragments match only when every fragment matches.
#[derive(Debug, Clone)]
pub enum CodeFragment {
    Text(String),
    Pattern(Regex),
}

impl CodeFragment {
    pub fn text(s: impl Into<String>) -> Self {
        CodeFragment::Text(s.into())
    }

    pub fn pattern(source: &str) -> Result<Self, PatternError> {
        Ok(CodeFragment::Pattern(cache::compile(source)?))
    }

    /// Manifest notation: `/.../` is a regex, anything else a substring.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            Self::pattern(&raw[1..raw.len() - 1])
        } else {
            Ok(Self::text(raw))
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            CodeFragment::Text(s) => text.contains(s.as_str()),
            CodeFragment::Pattern(re) => re.is_match(text).unwrap_or_else(|e| {
                debug!(target: "registry", "Fragment {} gave up: {}", self, e);
                false
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CodeFragment::Text(s) => s.is_empty(),
            CodeFragment::Pattern(re) => re.as_str().is_empty(),
        }
    }
}

impl PartialEq for CodeFragment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CodeFragment::Text(a), CodeFragment::Text(b)) => a == b,
            (CodeFragment::Pattern(a), CodeFragment::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for CodeFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeFragment::Text(s) => write!(f, "{:?}", s),
            CodeFragment::Pattern(re) => write!(f, "/{}/", uncanonicalize_pattern(re.as_str())),
        }
    }
}

impl From<&str> for CodeFragment {
    fn from(s: &str) -> Self {
        CodeFragment::text(s)
    }
}

impl From<Regex> for CodeFragment {
    fn from(re: Regex) -> Self {
        CodeFragment::Pattern(re)
    }
}

pub fn all_match(text: &str, fragments: &[CodeFragment]) -> bool {
    fragments.iter().all(|f| f.matches(text))
}

pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Vec<CodeFragment>, PatternError> {
    raw.iter().map(|s| CodeFragment::parse(s.as_ref())).collect()
}
