// Tue Jan 13 2026 - Alex

pub mod deferred;
pub mod dependant;
pub mod error;
pub mod filter;
pub mod history;
pub mod mangled;
pub mod resolver;

pub use deferred::{Deferred, ExportAccess, Strictness};
pub use dependant::{DependantLazy, DEFAULT_ATTEMPTS};
pub use error::LazyError;
pub use filter::Filter;
pub use history::{HistoryEntry, SearchCriteria, SearchHistory, SearchKind};
pub use resolver::LazyRegistry;
