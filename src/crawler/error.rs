// Tue Jan 13 2026 - Alex

use crate::host::HostError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    #[error("Verification aborted: {0}")]
    Fatal(String),
    #[error("No chunk ids could be found in the asset map")]
    NoChunkIds,
    #[error("Scanning did not settle within {cycles} poll cycles")]
    PollLimit { cycles: usize },
    #[error(transparent)]
    Host(#[from] HostError),
}
