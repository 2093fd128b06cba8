//! Order cache.
//!
//! A bounded, recency-ordered view over the order store. The store stays the
//! source of truth; the cache only holds what was last ingested or read.
//!
//! ```toml
//! [cache]
//! capacity = 1000
//! pending_access_limit = 64
//! ```

mod config;
mod lock;
mod store;

pub use config::{CacheConfig, DEFAULT_CACHE_CAPACITY, resolve_capacity};
pub use store::OrderCache;

pub(crate) use store::{METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_SIZE};
