// Tue Jan 13 2026 - Alex

pub mod runner;

pub use runner::{CrawlProgress, LineSink, VerificationOutcome, VerificationRunner};
