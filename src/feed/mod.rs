//! Order feed: transport abstraction, payload decoding and the consumer pump.

mod consumer;
mod decode;
mod source;

pub use consumer::{FeedConfig, FeedConsumer, OrderFeed};
pub use decode::{DecodeError, decode_order};
pub use source::{ChannelPublisher, ChannelSource, FeedError, FeedSource};

pub(crate) use consumer::{METRIC_FEED_DROPPED, METRIC_FEED_RECEIVED};
