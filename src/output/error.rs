// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("Failed to read diagnostics: {0}")]
    Read(#[from] std::io::Error),
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Invalid ignore pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Could not sign webhook body: {0}")]
    Signing(String),
    #[error("Webhook delivery failed: {0}")]
    Delivery(String),
}
