// Tue Jan 13 2026 - Alex

pub mod error;
pub mod install;
pub mod spec;

pub use error::ManifestError;
pub use install::{install, InstallSummary, InstalledExtension};
pub use spec::{ExtensionManifest, ExtensionSpec, LookupSpec};
