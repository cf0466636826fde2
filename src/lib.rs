// Tue Jan 13 2026 - Alex

pub mod config;
pub mod crawler;
pub mod engine;
pub mod host;
pub mod lazy;
pub mod manifest;
pub mod output;
pub mod patch;
pub mod pattern;
pub mod registry;
pub mod ui;
pub mod utils;
pub mod validation;

pub use config::Config;
pub use crawler::ChunkCrawler;
pub use engine::Engine;
pub use host::{BundleHost, SnapshotHost};
pub use lazy::LazyRegistry;
pub use manifest::ExtensionManifest;
pub use output::Report;
pub use patch::PatchEngine;
pub use registry::ModuleRegistry;
pub use validation::VerificationRunner;
