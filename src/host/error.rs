// Tue Jan 13 2026 - Alex

use crate::registry::{ChunkId, ModuleId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("No asset {0}")]
    AssetMissing(String),
    #[error("Fetching {asset} failed: {reason}")]
    FetchFailed { asset: String, reason: String },
    #[error("Loading chunk {chunk} failed: {reason}")]
    ChunkLoadFailed { chunk: ChunkId, reason: String },
    #[error("Module {0} has no factory")]
    UnknownModule(ModuleId),
    #[error("Module {id} threw: {reason}")]
    ExecutionFailed { id: ModuleId, reason: String },
    #[error("Unreadable asset map: {0}")]
    AssetMap(String),
    #[error("Invalid snapshot: {0}")]
    Snapshot(String),
}
