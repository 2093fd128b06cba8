use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(String),
    #[error("feed source closed")]
    Closed,
}

impl FeedError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// A transport delivering raw order payloads.
#[async_trait]
pub trait FeedSource: Send {
    /// Next payload. [`FeedError::Transport`] is retried by the consumer;
    /// [`FeedError::Closed`] means no further payloads will arrive.
    async fn recv(&mut self) -> Result<Vec<u8>, FeedError>;

    /// Release the underlying transport.
    async fn close(&mut self) -> Result<(), FeedError>;
}

/// In-process feed backed by an unbounded channel.
pub struct ChannelSource {
    payloads: mpsc::UnboundedReceiver<Result<Vec<u8>, FeedError>>,
    closed: Arc<AtomicBool>,
}

/// Producer half of a [`ChannelSource`].
#[derive(Clone)]
pub struct ChannelPublisher {
    payloads: mpsc::UnboundedSender<Result<Vec<u8>, FeedError>>,
    closed: Arc<AtomicBool>,
}

impl ChannelSource {
    pub fn pair() -> (ChannelPublisher, ChannelSource) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            ChannelPublisher {
                payloads: tx,
                closed: Arc::clone(&closed),
            },
            ChannelSource {
                payloads: rx,
                closed,
            },
        )
    }
}

impl ChannelPublisher {
    /// Queue a payload; returns `false` once the source is gone.
    pub fn publish(&self, payload: impl Into<Vec<u8>>) -> bool {
        self.payloads.send(Ok(payload.into())).is_ok()
    }

    /// Queue a transport failure to be observed by the next read.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.payloads
            .send(Err(FeedError::transport(message)))
            .is_ok()
    }

    pub fn source_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for ChannelSource {
    async fn recv(&mut self) -> Result<Vec<u8>, FeedError> {
        match self.payloads.recv().await {
            Some(result) => result,
            None => Err(FeedError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.payloads.close();
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
