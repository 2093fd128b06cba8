//! Pump that turns raw feed payloads into a bounded stream of orders.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::orders::Order;
use crate::shutdown::ShutdownListener;

use super::decode::decode_order;
use super::source::{FeedError, FeedSource};

pub(crate) const METRIC_FEED_RECEIVED: &str = "orderline_feed_received_total";
pub(crate) const METRIC_FEED_DROPPED: &str = "orderline_feed_dropped_total";

const DEFAULT_BUFFER: usize = 100;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Decoded orders held between the pump and the ingestion loop.
    pub buffer: NonZeroUsize,
    /// Pause after a failed transport read.
    pub retry_backoff: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            buffer: NonZeroUsize::new(DEFAULT_BUFFER).unwrap_or(NonZeroUsize::MIN),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl From<&crate::config::FeedSettings> for FeedConfig {
    fn from(settings: &crate::config::FeedSettings) -> Self {
        Self {
            buffer: settings.buffer,
            retry_backoff: settings.retry_backoff,
        }
    }
}

pub struct FeedConsumer<S> {
    source: S,
    config: FeedConfig,
}

impl<S> FeedConsumer<S>
where
    S: FeedSource + 'static,
{
    pub fn new(source: S, config: FeedConfig) -> Self {
        Self { source, config }
    }

    /// Spawn the pump. The returned feed ends after `shutdown` fires.
    pub fn start(self, shutdown: ShutdownListener) -> OrderFeed {
        let (tx, rx) = mpsc::channel(self.config.buffer.get());
        let pump = tokio::spawn(pump(self.source, self.config.retry_backoff, tx, shutdown));
        OrderFeed { orders: rx, pump }
    }
}

/// Receiving end of a running [`FeedConsumer`].
pub struct OrderFeed {
    orders: mpsc::Receiver<Order>,
    pump: JoinHandle<()>,
}

impl OrderFeed {
    /// `None` once the pump stopped and every buffered order was taken.
    pub async fn recv(&mut self) -> Option<Order> {
        self.orders.recv().await
    }

    /// Stream view of the feed; waits for the pump task after the last order.
    pub fn into_stream(self) -> impl Stream<Item = Order> + Send {
        let OrderFeed { mut orders, pump } = self;
        stream! {
            while let Some(order) = orders.recv().await {
                yield order;
            }
            if let Err(err) = pump.await {
                warn!(
                    target = "orderline::feed::consumer",
                    error = %err,
                    "Feed pump task ended abnormally"
                );
            }
        }
    }
}

async fn pump<S>(
    mut source: S,
    retry_backoff: Duration,
    orders: mpsc::Sender<Order>,
    mut shutdown: ShutdownListener,
) where
    S: FeedSource,
{
    info!(target = "orderline::feed::consumer", "Feed consumer started");

    loop {
        let received = tokio::select! {
            biased;
            () = shutdown.requested() => break,
            received = source.recv() => received,
        };

        match received {
            Ok(payload) => {
                counter!(METRIC_FEED_RECEIVED).increment(1);
                let order = match decode_order(&payload) {
                    Ok(order) => order,
                    Err(err) => {
                        warn!(
                            target = "orderline::feed::consumer",
                            reason = err.reason(),
                            error = %err,
                            bytes = payload.len(),
                            "Dropping undecodable order payload"
                        );
                        counter!(METRIC_FEED_DROPPED, "reason" => err.reason()).increment(1);
                        continue;
                    }
                };
                debug!(
                    target = "orderline::feed::consumer",
                    order_uid = %order.order_uid,
                    "Order received"
                );

                tokio::select! {
                    biased;
                    () = shutdown.requested() => break,
                    sent = orders.send(order) => {
                        if sent.is_err() {
                            info!(
                                target = "orderline::feed::consumer",
                                "Order receiver dropped; stopping feed consumer"
                            );
                            break;
                        }
                    }
                }
            }
            Err(FeedError::Closed) => {
                warn!(
                    target = "orderline::feed::consumer",
                    "Feed source closed; idling until shutdown"
                );
                shutdown.requested().await;
                break;
            }
            Err(err) => {
                warn!(
                    target = "orderline::feed::consumer",
                    error = %err,
                    backoff_ms = retry_backoff.as_millis() as u64,
                    "Feed read failed; retrying"
                );
                tokio::select! {
                    biased;
                    () = shutdown.requested() => break,
                    () = tokio::time::sleep(retry_backoff) => {}
                }
            }
        }
    }

    if let Err(err) = source.close().await {
        warn!(
            target = "orderline::feed::consumer",
            error = %err,
            "Failed to close feed source"
        );
    }
    info!(target = "orderline::feed::consumer", "Feed consumer stopped");
}
