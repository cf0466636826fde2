// Tue Jan 13 2026 - Alex

use crate::lazy::LazyError;
use crate::patch::PatchError;
use crate::pattern::PatternError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("Malformed manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate extension name {0}")]
    DuplicateName(String),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Lookup(#[from] LazyError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}
