pub mod eventhub;

pub use eventhub::EventHubSender;

use crate::normalize::NormalizedEvent;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink returned error status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Count of events the sink accepted for one batch.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryAck {
    pub accepted: usize,
}

/// Delivery capability for the streaming sink. The batch is handed over by
/// value: once `deliver` is called the caller holds no reference to the
/// events, and the returned ack is the sole source of truth for success.
///
/// Implementations serialize each event as one discrete message unit, not
/// one message per batch.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn deliver(&self, batch: Vec<NormalizedEvent>) -> Result<DeliveryAck, DeliveryError>;
}
