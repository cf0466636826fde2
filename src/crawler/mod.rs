// Tue Jan 13 2026 - Alex

pub mod chunk;
pub mod crawler;
pub mod error;
pub mod settled;

pub use chunk::{classify_asset, extract_chunk_groups, parse_asset_map, AssetKind, ChunkGroup};
pub use crawler::{ChunkCrawler, CrawlState, CrawlStats};
pub use error::CrawlError;
pub use settled::{DrainWatch, SettledSet};
