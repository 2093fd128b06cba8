mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use orderline::application::orders::OrderService;
use orderline::cache::{CacheConfig, OrderCache};
use orderline::feed::{ChannelSource, FeedConfig, FeedConsumer};
use orderline::shutdown::Shutdown;
use tokio::time::{sleep, timeout};

use support::{MemoryRepo, sample_order};

#[tokio::test]
async fn pipeline_emits_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debugging recorder should install");

    let repo = Arc::new(MemoryRepo::with_orders([sample_order("stored", 0)]));
    let cache = Arc::new(OrderCache::new(&CacheConfig::with_capacity(1)));
    let orders = Arc::new(
        OrderService::bootstrap(Arc::clone(&repo) as _, Arc::clone(&cache)).await,
    );

    assert!(orders.get_order("stored").await.expect("lookup").is_some());
    assert!(orders.get_order("missing").await.expect("lookup").is_none());

    let (publisher, source) = ChannelSource::pair();
    let shutdown = Shutdown::new();
    let feed = FeedConsumer::new(source, FeedConfig::default()).start(shutdown.subscribe());
    let ingestion = {
        let orders = Arc::clone(&orders);
        tokio::spawn(async move { orders.run(feed.into_stream()).await })
    };

    assert!(publisher.publish(b"garbage".to_vec()));
    let fresh = serde_json::to_vec(&sample_order("fresh", 1)).expect("encode order");
    assert!(publisher.publish(fresh));

    timeout(Duration::from_secs(5), async {
        while !cache.contains("fresh") {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("fresh order should be cached");

    shutdown.trigger();
    timeout(Duration::from_secs(5), ingestion)
        .await
        .expect("ingestion should stop")
        .expect("ingestion task should not panic");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "orderline_cache_hit_total",
        "orderline_cache_miss_total",
        "orderline_cache_evict_total",
        "orderline_cache_size",
        "orderline_cache_warm_ms",
        "orderline_feed_received_total",
        "orderline_feed_dropped_total",
        "orderline_ingest_total",
    ];
    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
