use crate::normalize::NormalizedEvent;
use crate::sink::{DeliveryError, Sender};
use thiserror::Error;

/// Delivery failure for one batch. Carries the failed batch's position and
/// event count so the invocation caller can decide whether to redeliver the
/// whole document.
#[derive(Debug, Error)]
#[error("delivery failed for batch {batch_index} ({event_count} events): {source}")]
pub struct BatchDeliveryError {
    pub batch_index: usize,
    pub event_count: usize,
    #[source]
    pub source: DeliveryError,
}

/// Accumulates normalized events and hands them to the sender in
/// document-ordered batches of at most `max_events`.
///
/// A batch is owned exclusively here until dispatch; on dispatch ownership
/// moves to the sender and no event is retained, succeed or fail. There is
/// no automatic retry or re-batching of failed events.
pub struct Batcher<'a, S: Sender> {
    sender: &'a S,
    max_events: usize,
    current: Vec<NormalizedEvent>,
    batches_sent: usize,
    events_sent: usize,
}

impl<'a, S: Sender> Batcher<'a, S> {
    /// `max_events` must be positive; config validation enforces this before
    /// a batcher is ever constructed.
    pub fn new(sender: &'a S, max_events: usize) -> Self {
        debug_assert!(max_events > 0);
        Self {
            sender,
            max_events,
            current: Vec::with_capacity(max_events),
            batches_sent: 0,
            events_sent: 0,
        }
    }

    /// Append an event to the in-progress batch, dispatching when the batch
    /// reaches the configured maximum.
    pub async fn push(&mut self, event: NormalizedEvent) -> Result<(), BatchDeliveryError> {
        self.current.push(event);
        if self.current.len() >= self.max_events {
            self.dispatch().await?;
        }
        Ok(())
    }

    /// Force delivery of the partial in-progress batch. An empty flush is a
    /// no-op and makes no delivery call.
    pub async fn flush(&mut self) -> Result<(), BatchDeliveryError> {
        if self.current.is_empty() {
            return Ok(());
        }
        self.dispatch().await
    }

    async fn dispatch(&mut self) -> Result<(), BatchDeliveryError> {
        let batch = std::mem::take(&mut self.current);
        let batch_index = self.batches_sent;
        let event_count = batch.len();

        match self.sender.deliver(batch).await {
            Ok(ack) => {
                tracing::debug!(
                    batch_index,
                    event_count,
                    accepted = ack.accepted,
                    "batch delivered"
                );
                self.batches_sent += 1;
                self.events_sent += event_count;
                self.current = Vec::with_capacity(self.max_events);
                Ok(())
            }
            Err(source) => Err(BatchDeliveryError {
                batch_index,
                event_count,
                source,
            }),
        }
    }

    pub fn batches_sent(&self) -> usize {
        self.batches_sent
    }

    pub fn events_sent(&self) -> usize {
        self.events_sent
    }

    /// Events accumulated but not yet dispatched.
    pub fn pending(&self) -> usize {
        self.current.len()
    }
}
