// Tue Jan 13 2026 - Alex

pub mod cache;
pub mod canonical;
pub mod error;
pub mod fragment;
pub mod matcher;
pub mod replacement;

pub use cache::{compile, RegexCache};
pub use fancy_regex::{Captures, Regex};
pub use canonical::{canonicalize_pattern, uncanonicalize_pattern, IDENTIFIER_PATTERN};
pub use error::PatternError;
pub use fragment::CodeFragment;
pub use matcher::{FindCriterion, Rewrite, TextMatcher, TextRewriter};
pub use replacement::{RegexRewrite, Replacement, ReplacementTemplate};
