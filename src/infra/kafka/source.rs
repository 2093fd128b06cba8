use async_trait::async_trait;
use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    message::Message,
};
use tracing::info;

use crate::config::KafkaSettings;
use crate::feed::{FeedError, FeedSource};
use crate::infra::error::InfraError;

use super::base_client_config;

const AUTO_COMMIT_INTERVAL_MS: &str = "1000";

/// Consumer-group subscription to the orders topic.
pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSource {
    pub fn connect(settings: &KafkaSettings) -> Result<Self, InfraError> {
        let consumer: StreamConsumer = base_client_config(settings)
            .set("group.id", &settings.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", AUTO_COMMIT_INTERVAL_MS)
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|err| InfraError::kafka(format!("failed to create consumer: {err}")))?;

        consumer
            .subscribe(&[settings.topic.as_str()])
            .map_err(|err| {
                InfraError::kafka(format!("failed to subscribe to `{}`: {err}", settings.topic))
            })?;

        info!(
            target = "orderline::infra::kafka",
            brokers = %settings.brokers.join(","),
            topic = %settings.topic,
            group_id = %settings.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: settings.topic.clone(),
        })
    }
}

#[async_trait]
impl FeedSource for KafkaSource {
    async fn recv(&mut self) -> Result<Vec<u8>, FeedError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|err| FeedError::transport(err.to_string()))?;
        Ok(message.payload().map(<[u8]>::to_vec).unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.consumer.unsubscribe();
        info!(
            target = "orderline::infra::kafka",
            topic = %self.topic,
            "Kafka consumer unsubscribed"
        );
        Ok(())
    }
}
