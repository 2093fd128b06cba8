//! Ingestion and read path for orders.
//!
//! Writes go to the store first and reach the cache only after the store
//! accepted them. Reads go to the cache first and fill it from the store on
//! a miss.

use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt, pin_mut};
use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

use crate::cache::OrderCache;
use crate::domain::orders::{Order, normalize};

use super::repos::{OrdersRepo, RepoError};

const METRIC_INGEST_TOTAL: &str = "orderline_ingest_total";
const METRIC_CACHE_WARM_MS: &str = "orderline_cache_warm_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrdersRepo>,
    cache: Arc<OrderCache>,
}

impl OrderService {
    /// Wire the service without touching the store.
    pub fn new(repo: Arc<dyn OrdersRepo>, cache: Arc<OrderCache>) -> Self {
        Self { repo, cache }
    }

    /// Wire the service and warm the cache from the store. A failed warm-up is
    /// logged and the service starts with a cold cache.
    pub async fn bootstrap(repo: Arc<dyn OrdersRepo>, cache: Arc<OrderCache>) -> Self {
        let service = Self::new(repo, cache);
        if let Err(err) = service.warm_cache().await {
            warn!(
                target = "orderline::application::orders",
                error = %err,
                "Cache warm-up failed; starting with an empty cache"
            );
        }
        service
    }

    /// Reload the cache with the newest stored orders, newest as most recent.
    pub async fn warm_cache(&self) -> Result<usize, RepoError> {
        let started_at = Instant::now();
        let orders = self.repo.list_all().await?;
        let available = orders.len();

        let mut newest: Vec<Order> = orders.into_iter().take(self.cache.capacity()).collect();
        newest.reverse();
        let loaded = self.cache.load_all(newest);

        histogram!(METRIC_CACHE_WARM_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "orderline::application::orders",
            loaded,
            available,
            capacity = self.cache.capacity(),
            "Cache warmed from store"
        );
        Ok(loaded)
    }

    /// Drain the order sequence until it ends.
    pub async fn run<S>(&self, orders: S)
    where
        S: Stream<Item = Order>,
    {
        pin_mut!(orders);
        info!(target = "orderline::application::orders", "Order ingestion started");

        let mut stored = 0_u64;
        let mut dropped = 0_u64;
        while let Some(order) = orders.next().await {
            if self.ingest(order).await {
                stored += 1;
            } else {
                dropped += 1;
            }
        }

        info!(
            target = "orderline::application::orders",
            stored, dropped, "Order ingestion stopped"
        );
    }

    /// Persist one order and, once durable, cache it. Returns whether it was stored.
    ///
    /// The order is normalized first so the cached copy matches what the
    /// store reads back. A failed write is logged and the order is dropped;
    /// the feed does not redeliver it.
    pub async fn ingest(&self, order: Order) -> bool {
        let order = normalize(order);
        match self.repo.save_order(&order).await {
            Ok(()) => {
                debug!(
                    target = "orderline::application::orders",
                    order_uid = %order.order_uid,
                    items = order.items.len(),
                    "Order stored"
                );
                self.cache.set(order);
                counter!(METRIC_INGEST_TOTAL, "result" => "stored").increment(1);
                true
            }
            Err(err) => {
                error!(
                    target = "orderline::application::orders",
                    order_uid = %order.order_uid,
                    error = %err,
                    "Failed to store order; message dropped"
                );
                counter!(METRIC_INGEST_TOTAL, "result" => "dropped").increment(1);
                false
            }
        }
    }

    /// Look up an order, cache first. `Ok(None)` means the store has no such order.
    pub async fn get_order(&self, order_uid: &str) -> Result<Option<Arc<Order>>, RepoError> {
        if let Some(order) = self.cache.get(order_uid) {
            return Ok(Some(order));
        }

        let Some(order) = self.repo.find_by_uid(order_uid).await? else {
            return Ok(None);
        };

        let order = Arc::new(order);
        self.cache.set_shared(Arc::clone(&order));
        Ok(Some(order))
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.size(),
            capacity: self.cache.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::stream;
    use time::{Duration, macros::datetime};

    use crate::cache::CacheConfig;
    use crate::domain::orders::{Delivery, Payment};

    use super::*;

    #[derive(Default)]
    struct MemoryRepo {
        orders: Mutex<HashMap<String, Order>>,
        fail_saves: AtomicBool,
        fail_reads: AtomicBool,
        finds: AtomicUsize,
    }

    impl MemoryRepo {
        fn with_orders(orders: Vec<Order>) -> Self {
            let repo = Self::default();
            {
                let mut stored = repo.orders.lock().expect("orders lock");
                for order in orders {
                    stored.insert(order.order_uid.clone(), order);
                }
            }
            repo
        }
    }

    #[async_trait]
    impl OrdersRepo for MemoryRepo {
        async fn save_order(&self, order: &Order) -> Result<(), RepoError> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(RepoError::from_persistence("store unavailable"));
            }
            self.orders
                .lock()
                .expect("orders lock")
                .insert(order.order_uid.clone(), order.clone());
            Ok(())
        }

        async fn find_by_uid(&self, order_uid: &str) -> Result<Option<Order>, RepoError> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(RepoError::Timeout);
            }
            Ok(self
                .orders
                .lock()
                .expect("orders lock")
                .get(order_uid)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<Order>, RepoError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(RepoError::Timeout);
            }
            let mut orders: Vec<Order> = self
                .orders
                .lock()
                .expect("orders lock")
                .values()
                .cloned()
                .collect();
            orders.sort_by(|a, b| b.date_created.cmp(&a.date_created));
            Ok(orders)
        }
    }

    fn sample_order(uid: &str, minutes: i64) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: Vec::new(),
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: datetime!(2024-05-01 12:00 UTC) + Duration::minutes(minutes),
            oof_shard: "1".to_string(),
        }
    }

    fn service(repo: Arc<MemoryRepo>, capacity: i64) -> OrderService {
        let cache = Arc::new(OrderCache::new(&CacheConfig::with_capacity(capacity)));
        OrderService::new(repo, cache)
    }

    #[tokio::test]
    async fn read_miss_fills_cache_from_store() {
        let repo = Arc::new(MemoryRepo::with_orders(vec![sample_order("A", 0)]));
        let service = service(Arc::clone(&repo), 4);

        let first = service.get_order("A").await.expect("lookup succeeds");
        let second = service.get_order("A").await.expect("lookup succeeds");

        assert_eq!(first.expect("found").order_uid, "A");
        assert!(second.is_some());
        assert_eq!(repo.finds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_order_is_not_an_error() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(repo, 4);

        let result = service.get_order("nope").await.expect("lookup succeeds");

        assert!(result.is_none());
        assert_eq!(service.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn store_failure_on_read_propagates() {
        let repo = Arc::new(MemoryRepo::default());
        repo.fail_reads.store(true, Ordering::SeqCst);
        let service = service(repo, 4);

        let result = service.get_order("A").await;

        assert!(matches!(result, Err(RepoError::Timeout)));
    }

    #[tokio::test]
    async fn failed_save_is_not_cached() {
        let repo = Arc::new(MemoryRepo::default());
        repo.fail_saves.store(true, Ordering::SeqCst);
        let service = service(Arc::clone(&repo), 4);

        assert!(!service.ingest(sample_order("A", 0)).await);

        assert_eq!(service.cache_stats().size, 0);
        repo.fail_saves.store(false, Ordering::SeqCst);
        assert!(service.get_order("A").await.expect("lookup succeeds").is_none());
    }

    #[tokio::test]
    async fn ingesting_same_uid_twice_keeps_latest() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::clone(&repo), 4);
        let mut updated = sample_order("A", 0);
        updated.track_number = "UPDATED".to_string();

        service
            .run(stream::iter(vec![sample_order("A", 0), updated]))
            .await;

        assert_eq!(service.cache_stats().size, 1);
        let cached = service.get_order("A").await.expect("lookup").expect("found");
        assert_eq!(cached.track_number, "UPDATED");
        assert_eq!(repo.orders.lock().expect("orders lock").len(), 1);
        assert_eq!(repo.finds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_continues_after_a_failed_save() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::clone(&repo), 4);

        repo.fail_saves.store(true, Ordering::SeqCst);
        assert!(!service.ingest(sample_order("A", 0)).await);
        repo.fail_saves.store(false, Ordering::SeqCst);
        service.run(stream::iter(vec![sample_order("B", 1)])).await;

        assert_eq!(service.cache_stats().size, 1);
        assert!(service.get_order("B").await.expect("lookup").is_some());
    }

    #[tokio::test]
    async fn ingested_order_is_cached_as_stored() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::clone(&repo), 4);
        let mut padded = sample_order(" A ", 0);
        padded.date_created = datetime!(2021-11-26 06:22:19.123456789 UTC);

        assert!(service.ingest(padded).await);

        let stored = repo
            .orders
            .lock()
            .expect("orders lock")
            .get("A")
            .cloned()
            .expect("stored under trimmed uid");
        assert_eq!(stored.date_created, datetime!(2021-11-26 06:22:19.123456 UTC));
        let cached = service.get_order("A").await.expect("lookup").expect("found");
        assert_eq!(*cached, stored);
        assert_eq!(repo.finds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bootstrap_survives_store_failure() {
        let repo = Arc::new(MemoryRepo::with_orders(vec![sample_order("A", 0)]));
        repo.fail_reads.store(true, Ordering::SeqCst);
        let cache = Arc::new(OrderCache::new(&CacheConfig::default()));

        let service = OrderService::bootstrap(repo, cache).await;

        assert_eq!(service.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn warm_cache_keeps_newest_orders_most_recent() {
        let repo = Arc::new(MemoryRepo::with_orders(vec![
            sample_order("oldest", 0),
            sample_order("middle", 1),
            sample_order("newest", 2),
        ]));
        let cache = Arc::new(OrderCache::new(&CacheConfig::with_capacity(2)));

        let service = OrderService::bootstrap(repo, Arc::clone(&cache)).await;

        assert_eq!(service.cache_stats(), CacheStats { size: 2, capacity: 2 });
        assert_eq!(cache.keys_by_recency(), vec!["newest", "middle"]);
    }
}
