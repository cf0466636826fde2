// Tue Jan 13 2026 - Alex

use crate::pattern::PatternError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LazyError {
    #[error("{query} is not yet available")]
    NotYetAvailable { query: String },
    #[error("{query} failed: {reason}")]
    Failed { query: String, reason: String },
    #[error("Malformed search criteria: {0}")]
    MalformedCriteria(String),
    #[error("Lazy factory returned nothing after {attempts} attempts")]
    AttemptsExhausted { attempts: usize },
    #[error(transparent)]
    Pattern(#[from] PatternError),
}
