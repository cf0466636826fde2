// Tue Jan 13 2026 - Alex

pub mod core;
pub mod signal;

pub use self::core::{ChunkLoader, Engine, EngineState};
pub use signal::FatalSignal;
