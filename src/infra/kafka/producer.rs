use std::time::Duration;

use rdkafka::{
    error::KafkaError,
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::seed::generate_test_order;
use crate::config::KafkaSettings;
use crate::domain::orders::Order;
use crate::infra::error::InfraError;

use super::base_client_config;

#[derive(Debug, Error)]
pub enum ProduceError {
    #[error("failed to encode order: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to publish order `{order_uid}`: {source}")]
    Publish {
        order_uid: String,
        #[source]
        source: KafkaError,
    },
    #[error("failed to flush producer: {0}")]
    Flush(#[source] KafkaError),
}

/// Publishes JSON-encoded orders keyed by `order_uid`.
pub struct OrderProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl OrderProducer {
    pub fn new(settings: &KafkaSettings) -> Result<Self, InfraError> {
        let producer: FutureProducer = base_client_config(settings)
            .set("message.timeout.ms", settings.produce_timeout.as_millis().to_string())
            .create()
            .map_err(|err| InfraError::kafka(format!("failed to create producer: {err}")))?;

        Ok(Self {
            producer,
            topic: settings.topic.clone(),
            timeout: settings.produce_timeout,
        })
    }

    pub async fn send(&self, order: &Order) -> Result<(), ProduceError> {
        let payload = serde_json::to_vec(order)?;
        let record = FutureRecord::to(&self.topic)
            .key(order.order_uid.as_str())
            .payload(&payload);

        self.producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map_err(|(source, _)| ProduceError::Publish {
                order_uid: order.order_uid.clone(),
                source,
            })?;

        debug!(
            target = "orderline::infra::kafka",
            order_uid = %order.order_uid,
            bytes = payload.len(),
            "Order published"
        );
        Ok(())
    }

    /// Publish `count` generated orders, stopping at the first failure.
    pub async fn send_test_orders(&self, count: usize) -> Result<usize, ProduceError> {
        for index in 0..count {
            let order = generate_test_order(index);
            self.send(&order).await?;
            info!(
                target = "orderline::infra::kafka",
                order_uid = %order.order_uid,
                index,
                "Test order sent"
            );
        }

        self.producer
            .flush(Timeout::After(self.timeout))
            .map_err(ProduceError::Flush)?;
        Ok(count)
    }
}
