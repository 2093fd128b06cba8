use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_SIZE};
use crate::config::{LogFormat, LoggingSettings};
use crate::feed::{METRIC_FEED_DROPPED, METRIC_FEED_RECEIVED};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(METRIC_CACHE_HIT, Unit::Count, "Order cache lookups served from memory.");
        describe_counter!(METRIC_CACHE_MISS, Unit::Count, "Order cache lookups that found nothing.");
        describe_counter!(
            METRIC_CACHE_EVICT,
            Unit::Count,
            "Orders evicted from the cache to stay within capacity."
        );
        describe_gauge!(METRIC_CACHE_SIZE, Unit::Count, "Orders currently held in the cache.");
        describe_histogram!(
            "orderline_cache_warm_ms",
            Unit::Milliseconds,
            "Time spent warming the cache from the store at startup."
        );
        describe_counter!(
            METRIC_FEED_RECEIVED,
            Unit::Count,
            "Raw payloads read from the order feed."
        );
        describe_counter!(
            METRIC_FEED_DROPPED,
            Unit::Count,
            "Feed payloads dropped before ingestion, labelled by reason."
        );
        describe_counter!(
            "orderline_ingest_total",
            Unit::Count,
            "Orders handled by the ingestion loop, labelled by result."
        );
    });
}
