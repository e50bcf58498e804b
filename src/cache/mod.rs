//! Local record store for issues, sprints, and search result sets.

pub mod counters;
pub mod extract;
pub mod fts;
pub mod noise;
pub mod search_key;
pub mod stats;
pub mod store;
pub mod ttl;
pub mod types;

pub use counters::FlushPolicy;
pub use store::{CacheStore, InvalidateAllResult, NewSearch, PurgeResult};
pub use ttl::AdaptiveTtl;
pub use types::{CachedIssue, CachedSearch, CachedSprint};
