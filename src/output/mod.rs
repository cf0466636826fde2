// Tue Jan 13 2026 - Alex

pub mod channel;
pub mod collector;
pub mod error;
pub mod report;
pub mod webhook;

pub use channel::{Category, DiagnosticLine};
pub use collector::{ReportCollector, DEFAULT_IGNORED_ERRORS};
pub use error::OutputError;
pub use report::{BadStart, Report};
pub use webhook::{build_payload, deliver, sign, WebhookPayload};
