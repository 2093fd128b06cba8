//! Kafka adapters for the order feed.

mod producer;
mod source;

pub use producer::{OrderProducer, ProduceError};
pub use source::KafkaSource;

use rdkafka::ClientConfig;

use crate::config::KafkaSettings;

fn base_client_config(settings: &KafkaSettings) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", settings.brokers.join(","));
    config
}
