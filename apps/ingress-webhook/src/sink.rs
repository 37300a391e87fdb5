use std::sync::Arc;

use async_trait::async_trait;
use maxbot_core::WebhookEvent;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("event consumer is gone")]
    Closed,
}

/// Downstream consumer of verified webhook events. Called exactly once per
/// accepted delivery.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: WebhookEvent) -> Result<(), SinkError>;
}

pub type SharedEventSink = Arc<dyn EventSink>;

/// Forwards events into a bounded channel; a full channel holds the request
/// open until the consumer catches up.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<WebhookEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WebhookEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn deliver(&self, event: WebhookEvent) -> Result<(), SinkError> {
        self.tx.send(event).await.map_err(|_| SinkError::Closed)
    }
}
