//! Order cache configuration.

use std::num::NonZeroUsize;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
const DEFAULT_PENDING_ACCESS_LIMIT: usize = 64;

/// Capacity for a requested value; zero or negative selects [`DEFAULT_CACHE_CAPACITY`].
pub fn resolve_capacity(requested: i64) -> NonZeroUsize {
    usize::try_from(requested)
        .ok()
        .and_then(NonZeroUsize::new)
        .unwrap_or(default_capacity())
}

fn default_capacity() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of orders held in memory.
    pub capacity: NonZeroUsize,
    /// Buffered read accesses that trigger an opportunistic recency flush.
    pub pending_access_limit: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            pending_access_limit: NonZeroUsize::new(DEFAULT_PENDING_ACCESS_LIMIT)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            capacity: settings.capacity,
            pending_access_limit: settings.pending_access_limit,
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(requested: i64) -> Self {
        Self {
            capacity: resolve_capacity(requested),
            ..Self::default()
        }
    }
}
