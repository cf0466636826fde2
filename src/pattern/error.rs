// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Replacement references capture group {group} which {pattern} does not define")]
    MissingCaptureGroup { group: String, pattern: String },
    #[error("Invalid replacement template: {0}")]
    InvalidTemplate(String),
    #[error("Matching {pattern} failed: {reason}")]
    MatchFailed { pattern: String, reason: String },
    #[error("Replacement function failed: {0}")]
    ReplacementFailed(String),
}
