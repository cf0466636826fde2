// Tue Jan 13 2026 - Alex

//! The bundler runtime being instrumented.

pub mod error;
pub mod snapshot;

pub use error::HostError;
pub use snapshot::{Snapshot, SnapshotHost};

use crate::crawler::chunk::parse_asset_map;
use crate::registry::{ChunkId, ModuleExports, ModuleId};
use async_trait::async_trait;

/// A module factory as the host hands it over: an id and the serialized
/// function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFactory {
    pub id: ModuleId,
    pub source: Vec<u8>,
}

impl ModuleFactory {
    pub fn new(id: impl Into<ModuleId>, source: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }
}

#[async_trait(?Send)]
pub trait BundleHost {
    /// Asset file backing a chunk, or `None` when the host maps the chunk to
    /// nothing.
    fn chunk_asset(&self, chunk: &ChunkId) -> Option<String>;

    /// Serialized chunk-to-asset mapping, as it appears in the host runtime.
    fn asset_map_source(&self) -> String;

    fn known_chunk_ids(&self) -> Result<Vec<ChunkId>, HostError> {
        parse_asset_map(&self.asset_map_source()).map_err(|e| HostError::AssetMap(e.to_string()))
    }

    async fn fetch_asset(&self, asset: &str) -> Result<Vec<u8>, HostError>;

    /// Loads a chunk and returns the factories it registers.
    async fn load_chunk(&self, chunk: &ChunkId) -> Result<Vec<ModuleFactory>, HostError>;

    /// Runs a module. `patched` is the rewritten factory body; `None` runs
    /// the factory exactly as shipped.
    fn execute(&self, id: &ModuleId, patched: Option<&str>) -> Result<ModuleExports, HostError>;

    fn initial_chunks(&self) -> Vec<ChunkId>;

    /// Modules the host requires on its own once the initial chunks load.
    fn entry_modules(&self) -> Vec<ModuleId>;
}
