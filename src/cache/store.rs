//! Bounded in-memory order cache with least-recently-used eviction.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};

use lru::LruCache;
use metrics::{counter, gauge};

use crate::domain::orders::Order;

use super::config::CacheConfig;
use super::lock::{mutex_lock, rw_read, rw_try_write, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "orderline_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "orderline_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "orderline_cache_evict_total";
pub(crate) const METRIC_CACHE_SIZE: &str = "orderline_cache_size";

/// Backlog multiple at which readers stop deferring and flush synchronously.
const PENDING_HARD_LIMIT_FACTOR: usize = 4;

/// Capacity-bounded map from `order_uid` to order.
///
/// Readers only take the shared lock: a hit is served with `peek` and the key
/// is buffered for a later recency refresh. Buffered keys are promoted under
/// the exclusive lock before any structural change, so refreshes are ordered
/// with respect to evictions. Promoting a key that was evicted in the
/// meantime does nothing.
pub struct OrderCache {
    capacity: NonZeroUsize,
    pending_limit: usize,
    entries: RwLock<LruCache<String, Arc<Order>>>,
    pending: Mutex<Vec<String>>,
}

impl OrderCache {
    pub fn new(config: &CacheConfig) -> Self {
        let pending_limit = config.pending_access_limit.get();
        Self {
            capacity: config.capacity,
            pending_limit,
            entries: RwLock::new(LruCache::new(config.capacity)),
            pending: Mutex::new(Vec::with_capacity(pending_limit)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn size(&self) -> usize {
        rw_read(&self.entries, SOURCE, "size").len()
    }

    /// Membership check that leaves recency untouched.
    pub fn contains(&self, order_uid: &str) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains(order_uid)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        let hit = rw_read(&self.entries, SOURCE, "get")
            .peek(order_uid)
            .map(Arc::clone);

        match hit {
            Some(order) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                self.record_access(order_uid);
                Some(order)
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    fn record_access(&self, order_uid: &str) {
        let backlog = {
            let mut pending = mutex_lock(&self.pending, SOURCE, "record_access");
            pending.push(order_uid.to_string());
            pending.len()
        };

        if backlog < self.pending_limit {
            return;
        }

        if backlog >= self.pending_limit.saturating_mul(PENDING_HARD_LIMIT_FACTOR) {
            let mut entries = rw_write(&self.entries, SOURCE, "record_access");
            self.apply_pending(&mut entries);
        } else if let Some(mut entries) = rw_try_write(&self.entries, SOURCE, "record_access") {
            self.apply_pending(&mut entries);
        }
    }

    fn apply_pending(&self, entries: &mut LruCache<String, Arc<Order>>) {
        let drained = std::mem::take(&mut *mutex_lock(&self.pending, SOURCE, "apply_pending"));
        for order_uid in &drained {
            entries.promote(order_uid);
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn set(&self, order: Order) {
        self.set_shared(Arc::new(order));
    }

    /// Insert or replace, evicting the least recently used entry when full.
    pub fn set_shared(&self, order: Arc<Order>) {
        let mut entries = rw_write(&self.entries, SOURCE, "set");
        self.apply_pending(&mut entries);

        let evicted = upsert(&mut entries, order);
        let size = entries.len();
        drop(entries);

        if evicted {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
        gauge!(METRIC_CACHE_SIZE).set(size as f64);
    }

    /// Replace the whole cache with the first `capacity` orders of `orders`.
    /// Later orders end up more recent. Returns the resulting size.
    pub fn load_all<I>(&self, orders: I) -> usize
    where
        I: IntoIterator<Item = Order>,
    {
        let mut entries = rw_write(&self.entries, SOURCE, "load_all");
        mutex_lock(&self.pending, SOURCE, "load_all").clear();
        entries.clear();

        for order in orders {
            if entries.len() >= self.capacity.get() && !entries.contains(order.order_uid.as_str()) {
                break;
            }
            upsert(&mut entries, Arc::new(order));
        }

        let size = entries.len();
        drop(entries);

        gauge!(METRIC_CACHE_SIZE).set(size as f64);
        size
    }

    /// Keys ordered from most to least recently used, with buffered reads applied.
    pub fn keys_by_recency(&self) -> Vec<String> {
        let mut entries = rw_write(&self.entries, SOURCE, "keys_by_recency");
        self.apply_pending(&mut entries);
        entries.iter().map(|(order_uid, _)| order_uid.clone()).collect()
    }
}

/// Returns whether another entry was evicted to make room.
fn upsert(entries: &mut LruCache<String, Arc<Order>>, order: Arc<Order>) -> bool {
    let order_uid = order.order_uid.clone();
    match entries.push(order_uid.clone(), order) {
        Some((displaced, _)) => displaced != order_uid,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::thread;

    use time::macros::datetime;

    use crate::domain::orders::{Delivery, Item, Payment};

    use super::*;

    fn sample_order(uid: &str, track_number: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: track_number.to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: vec![Item {
                chrt_id: 1,
                track_number: track_number.to_string(),
                ..Item::default()
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: datetime!(2024-05-01 12:00 UTC),
            oof_shard: "1".to_string(),
        }
    }

    fn cache_with_capacity(capacity: i64) -> OrderCache {
        OrderCache::new(&CacheConfig::with_capacity(capacity))
    }

    #[test]
    fn evicts_least_recently_used_on_insert_at_capacity() {
        let cache = cache_with_capacity(2);
        cache.set(sample_order("A", "t"));
        cache.set(sample_order("B", "t"));
        assert!(cache.get("A").is_some());

        cache.set(sample_order("C", "t"));

        assert!(cache.get("B").is_none());
        assert!(cache.contains("A"));
        assert!(cache.contains("C"));
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn replacing_existing_key_keeps_size_and_refreshes_recency() {
        let cache = cache_with_capacity(2);
        cache.set(sample_order("A", "v1"));
        cache.set(sample_order("B", "v1"));

        cache.set(sample_order("A", "v2"));

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.keys_by_recency(), vec!["A", "B"]);
        let order = cache.get("A").expect("A cached");
        assert_eq!(order.track_number, "v2");

        cache.set(sample_order("C", "v1"));
        assert!(!cache.contains("B"));
    }

    #[test]
    fn miss_has_no_side_effects() {
        let cache = cache_with_capacity(2);
        cache.set(sample_order("A", "t"));
        cache.set(sample_order("B", "t"));

        assert!(cache.get("missing").is_none());

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.keys_by_recency(), vec!["B", "A"]);
    }

    #[test]
    fn non_positive_capacity_uses_default() {
        assert_eq!(cache_with_capacity(0).capacity(), 1000);
        assert_eq!(cache_with_capacity(-3).capacity(), 1000);
    }

    #[test]
    fn load_all_replaces_contents_and_truncates() {
        let cache = cache_with_capacity(2);
        cache.set(sample_order("old", "t"));

        let loaded = cache.load_all(vec![
            sample_order("A", "t"),
            sample_order("B", "t"),
            sample_order("C", "t"),
        ]);

        assert_eq!(loaded, 2);
        assert!(!cache.contains("old"));
        assert!(!cache.contains("C"));
        assert_eq!(cache.keys_by_recency(), vec!["B", "A"]);
    }

    #[test]
    fn load_all_with_empty_sequence_clears_cache() {
        let cache = cache_with_capacity(3);
        cache.set(sample_order("A", "t"));

        assert_eq!(cache.load_all(Vec::new()), 0);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn load_all_discards_buffered_accesses() {
        let cache = cache_with_capacity(2);
        cache.set(sample_order("A", "t"));
        assert!(cache.get("A").is_some());

        cache.load_all(vec![sample_order("X", "t"), sample_order("Y", "t")]);

        assert_eq!(cache.keys_by_recency(), vec!["Y", "X"]);
    }

    #[test]
    fn buffered_access_after_eviction_is_ignored() {
        let cache = cache_with_capacity(1);
        cache.set(sample_order("A", "t"));

        cache.set(sample_order("B", "t"));
        mutex_lock(&cache.pending, SOURCE, "test").push("A".to_string());
        cache.set(sample_order("C", "t"));

        assert_eq!(cache.keys_by_recency(), vec!["C"]);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn buffered_reads_flush_before_eviction() {
        let cache = OrderCache::new(&CacheConfig {
            pending_access_limit: NonZeroUsize::new(1024).expect("non-zero limit"),
            ..CacheConfig::with_capacity(3)
        });
        cache.set(sample_order("A", "t"));
        cache.set(sample_order("B", "t"));
        cache.set(sample_order("C", "t"));

        assert!(cache.get("A").is_some());
        assert!(cache.get("B").is_some());
        cache.set(sample_order("D", "t"));

        assert!(!cache.contains("C"));
        assert_eq!(cache.keys_by_recency(), vec!["D", "B", "A"]);
    }

    #[test]
    fn concurrent_access_preserves_capacity() {
        let cache = Arc::new(cache_with_capacity(16));

        thread::scope(|scope| {
            for worker in 0..4 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for i in 0..500 {
                        let uid = format!("order-{}", (worker * 7 + i) % 40);
                        if i % 3 == 0 {
                            cache.set(sample_order(&uid, "t"));
                        } else {
                            let _ = cache.get(&uid);
                        }
                        assert!(cache.size() <= 16);
                    }
                });
            }
        });

        let keys = cache.keys_by_recency();
        assert_eq!(keys.len(), cache.size());
        assert!(keys.len() <= 16);
        for key in keys {
            assert!(cache.contains(&key));
        }
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let cache = cache_with_capacity(2);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.entries.write().expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        cache.set(sample_order("A", "t"));
        assert!(cache.get("A").is_some());
    }
}
