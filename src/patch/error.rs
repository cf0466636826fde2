// Tue Jan 13 2026 - Alex

use crate::pattern::PatternError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Patch by {owner} has an empty find criterion")]
    EmptyFind { owner: String },
    #[error("Patch by {owner} has no replacement rules")]
    NoRules { owner: String },
    #[error("Patch by {owner} has an invalid find criterion: {source}")]
    InvalidFind { owner: String, source: PatternError },
    #[error("Patch by {owner} has an invalid rule {index}: {source}")]
    InvalidRule {
        owner: String,
        index: usize,
        source: PatternError,
    },
    #[error("Patch by {owner} rule {index} expects zero applications")]
    ZeroExpected { owner: String, index: usize },
    #[error("Unknown patch {0}")]
    UnknownPatch(usize),
}
