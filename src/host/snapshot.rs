// Tue Jan 13 2026 - Alex

use crate::host::{BundleHost, HostError, ModuleFactory};
use crate::registry::{ChunkId, ExportValue, ModuleExports, ModuleId};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkEntry {
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub modules: Vec<ModuleId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub source: String,
    #[serde(default = "ModuleEntry::default_exports")]
    pub exports: ModuleExports,
    /// Patched bodies containing any of these fail to run.
    #[serde(default)]
    pub execution_fails_on: Vec<String>,
    #[serde(default)]
    pub throws: bool,
}

impl ModuleEntry {
    fn default_exports() -> ModuleExports {
        ModuleExports::empty()
    }
}

/// A recorded bundle: which chunks exist, which assets back them, and what
/// each module's factory looks like and exports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub chunks: IndexMap<ChunkId, ChunkEntry>,
    #[serde(default)]
    pub assets: IndexMap<String, String>,
    #[serde(default)]
    pub modules: IndexMap<ModuleId, ModuleEntry>,
    /// Raw asset-map text; generated from `chunks` when absent.
    #[serde(default)]
    pub asset_map: Option<String>,
    #[serde(default)]
    pub initial_chunks: Vec<ChunkId>,
    #[serde(default)]
    pub entry_modules: Vec<ModuleId>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HostError::Snapshot(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| HostError::Snapshot(format!("{}: {}", path.display(), e)))
    }

    pub fn with_chunk(mut self, id: &str, asset: Option<&str>, modules: &[&str]) -> Self {
        self.chunks.insert(
            ChunkId::from(id),
            ChunkEntry {
                asset: asset.map(str::to_string),
                modules: modules.iter().map(|m| ModuleId::from(*m)).collect(),
            },
        );
        self
    }

    pub fn with_asset(mut self, name: &str, body: &str) -> Self {
        self.assets.insert(name.to_string(), body.to_string());
        self
    }

    /// Registers a chunk backed by an ordinary script asset.
    pub fn with_script_chunk(self, id: &str, modules: &[&str]) -> Self {
        let asset = format!("{}.js", id);
        self.with_chunk(id, Some(&asset), modules)
            .with_asset(&asset, "(self.webpackChunk=self.webpackChunk||[]).push()")
    }

    pub fn with_module(mut self, id: &str, source: &str, exports: ExportValue) -> Self {
        self.modules.insert(
            ModuleId::from(id),
            ModuleEntry {
                source: source.to_string(),
                exports: ModuleExports::new(exports),
                execution_fails_on: Vec::new(),
                throws: false,
            },
        );
        self
    }

    pub fn with_fragile_module(mut self, id: &str, source: &str, exports: ExportValue, fails_on: &str) -> Self {
        self = self.with_module(id, source, exports);
        if let Some(entry) = self.modules.get_mut(&ModuleId::from(id)) {
            entry.execution_fails_on.push(fails_on.to_string());
        }
        self
    }

    pub fn with_asset_map(mut self, text: &str) -> Self {
        self.asset_map = Some(text.to_string());
        self
    }

    pub fn with_initial_chunk(mut self, id: &str) -> Self {
        self.initial_chunks.push(ChunkId::from(id));
        self
    }

    pub fn with_entry_module(mut self, id: &str) -> Self {
        self.entry_modules.push(ModuleId::from(id));
        self
    }

    fn generated_asset_map(&self) -> String {
        let entries: Vec<String> = self
            .chunks
            .iter()
            .filter_map(|(id, chunk)| chunk.asset.as_ref().map(|asset| format!("{}:{:?}", id, asset)))
            .collect();
        format!("{{{}}}", entries.join(","))
    }
}

/// In-memory host over a [`Snapshot`]. Records what was loaded and run.
pub struct SnapshotHost {
    snapshot: Snapshot,
    loaded: RefCell<Vec<ChunkId>>,
    executed: RefCell<Vec<ModuleId>>,
}

impl SnapshotHost {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            loaded: RefCell::new(Vec::new()),
            executed: RefCell::new(Vec::new()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        Ok(Self::new(Snapshot::load(path)?))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn loaded_chunks(&self) -> Vec<ChunkId> {
        self.loaded.borrow().clone()
    }

    pub fn executed_modules(&self) -> Vec<ModuleId> {
        self.executed.borrow().clone()
    }

    /// Every factory in the snapshot, in recorded order.
    pub fn all_factories(&self) -> Vec<ModuleFactory> {
        self.snapshot
            .modules
            .iter()
            .map(|(id, m)| ModuleFactory::new(id.clone(), m.source.as_bytes().to_vec()))
            .collect()
    }
}

#[async_trait(?Send)]
impl BundleHost for SnapshotHost {
    fn chunk_asset(&self, chunk: &ChunkId) -> Option<String> {
        self.snapshot.chunks.get(chunk).and_then(|c| c.asset.clone())
    }

    fn asset_map_source(&self) -> String {
        self.snapshot
            .asset_map
            .clone()
            .unwrap_or_else(|| self.snapshot.generated_asset_map())
    }

    async fn fetch_asset(&self, asset: &str) -> Result<Vec<u8>, HostError> {
        tokio::task::yield_now().await;
        self.snapshot
            .assets
            .get(asset)
            .map(|body| body.as_bytes().to_vec())
            .ok_or_else(|| HostError::AssetMissing(asset.to_string()))
    }

    async fn load_chunk(&self, chunk: &ChunkId) -> Result<Vec<ModuleFactory>, HostError> {
        tokio::task::yield_now().await;
        let entry = self.snapshot.chunks.get(chunk).ok_or_else(|| HostError::ChunkLoadFailed {
            chunk: chunk.clone(),
            reason: "unknown chunk".to_string(),
        })?;
        if entry.asset.is_none() {
            return Err(HostError::ChunkLoadFailed {
                chunk: chunk.clone(),
                reason: "no asset backs this chunk".to_string(),
            });
        }

        let mut factories = Vec::with_capacity(entry.modules.len());
        for id in &entry.modules {
            let module = self.snapshot.modules.get(id).ok_or_else(|| HostError::ChunkLoadFailed {
                chunk: chunk.clone(),
                reason: format!("module {} missing from snapshot", id),
            })?;
            factories.push(ModuleFactory::new(id.clone(), module.source.as_bytes().to_vec()));
        }

        self.loaded.borrow_mut().push(chunk.clone());
        Ok(factories)
    }

    fn execute(&self, id: &ModuleId, patched: Option<&str>) -> Result<ModuleExports, HostError> {
        let module = self
            .snapshot
            .modules
            .get(id)
            .ok_or_else(|| HostError::UnknownModule(id.clone()))?;

        if module.throws {
            return Err(HostError::ExecutionFailed {
                id: id.clone(),
                reason: "module threw during execution".to_string(),
            });
        }
        if let Some(body) = patched {
            if let Some(marker) = module.execution_fails_on.iter().find(|m| body.contains(m.as_str())) {
                return Err(HostError::ExecutionFailed {
                    id: id.clone(),
                    reason: format!("SyntaxError near {:?}", marker),
                });
            }
        }

        self.executed.borrow_mut().push(id.clone());
        Ok(module.exports.clone())
    }

    fn initial_chunks(&self) -> Vec<ChunkId> {
        self.snapshot.initial_chunks.clone()
    }

    fn entry_modules(&self) -> Vec<ModuleId> {
        self.snapshot.entry_modules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot::new()
            .with_script_chunk("1", &["10"])
            .with_chunk("2", None, &[])
            .with_module("10", "function(e,t,n){}", ExportValue::object(vec![("a", ExportValue::function("f"))]))
            .with_initial_chunk("1")
            .with_entry_module("10")
    }

    #[test]
    fn test_generated_asset_map_lists_backed_chunks() {
        let host = SnapshotHost::new(sample());
        assert_eq!(host.asset_map_source(), r#"{1:"1.js"}"#);
        assert_eq!(host.known_chunk_ids().unwrap(), vec![ChunkId::from("1")]);
        assert_eq!(host.chunk_asset(&ChunkId::from("2")), None);
    }

    #[tokio::test]
    async fn test_load_chunk_and_execute() {
        let host = SnapshotHost::new(sample());
        let factories = host.load_chunk(&ChunkId::from("1")).await.unwrap();
        assert_eq!(factories.len(), 1);
        assert_eq!(host.loaded_chunks(), vec![ChunkId::from("1")]);

        let exports = host.execute(&ModuleId::from("10"), None).unwrap();
        assert!(exports.root().has_props(&["a"]));
        assert!(host.execute(&ModuleId::from("99"), None).is_err());
    }

    #[tokio::test]
    async fn test_chunk_without_asset_does_not_load() {
        let host = SnapshotHost::new(sample());
        assert!(matches!(
            host.load_chunk(&ChunkId::from("2")).await,
            Err(HostError::ChunkLoadFailed { .. })
        ));
        assert!(host.loaded_chunks().is_empty());
    }

    #[tokio::test]
    async fn test_missing_asset() {
        let host = SnapshotHost::new(sample());
        assert!(matches!(host.fetch_asset("nope.js").await, Err(HostError::AssetMissing(_))));
        assert!(host.fetch_asset("1.js").await.is_ok());
    }

    #[test]
    fn test_fragile_module_rejects_bad_patch() {
        let snapshot = Snapshot::new().with_fragile_module("5", "a()", ExportValue::null(), "BROKEN");
        let host = SnapshotHost::new(snapshot);
        let id = ModuleId::from("5");
        assert!(host.execute(&id, Some("BROKEN a()")).is_err());
        assert!(host.execute(&id, Some("fine a()")).is_ok());
        assert!(host.execute(&id, None).is_ok());
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = sample();
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), snapshot);
    }
}
