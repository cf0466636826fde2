// Tue Jan 13 2026 - Alex

pub mod exports;
pub mod id;
pub mod record;
pub mod registry;

pub use exports::{ExportPath, ExportValue, ModuleExports};
pub use id::{ChunkId, ModuleId};
pub use record::ModuleRecord;
pub use registry::{InterceptOutcome, ModuleRegistry};
