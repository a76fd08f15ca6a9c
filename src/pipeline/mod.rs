use crate::batch::{BatchDeliveryError, Batcher};
use crate::decode::{self, DecodeError, EncodingHint};
use crate::document::{self, DocumentError};
use crate::normalize::{self, describe_version, FlowVersion, TupleContext, TupleError};
use crate::sink::Sender;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("delivery error: {0}")]
    Delivery(#[from] BatchDeliveryError),
}

/// Result of one successfully processed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub events_sent: usize,
    pub batches_sent: usize,
    pub tuples_skipped: usize,
}

/// Run one document through the full pipeline: decode, parse, normalize
/// every tuple in document order, batch, and flush.
///
/// Tuple-level errors are logged, counted, and skipped; the rest of the
/// document still flows. Decode, parse, and delivery errors abort the
/// invocation. Batches already dispatched before an abort stay dispatched,
/// so redelivering the document gives at-least-once semantics.
pub async fn process_document<S: Sender>(
    bytes: &[u8],
    hint: EncodingHint,
    max_events: usize,
    sender: &S,
) -> Result<DocumentOutcome, PipelineError> {
    let text = decode::decode(bytes, hint)?;
    let doc = document::parse_document(&text)?;

    let mut batcher = Batcher::new(sender, max_events);
    let mut tuples_skipped = 0usize;

    for record in &doc.records {
        let version = FlowVersion::from_declared(record.properties.version.as_ref());
        let groups = record.flow_groups();
        if version.is_none() && !groups.is_empty() {
            tracing::warn!(
                resource_id = %record.resource_id,
                version = %describe_version(record.properties.version.as_ref()),
                "unrecognized format version, skipping record tuples"
            );
        }

        for group in groups {
            let mac = normalize::normalize_mac(group.mac);
            let ctx = TupleContext {
                resource_id: &record.resource_id,
                category: &record.category,
                record_time: &record.time,
                rule: group.rule,
                mac: &mac,
            };

            for tuple in group.tuples {
                let normalized = match version {
                    Some(v) => normalize::normalize_tuple(tuple, v, &ctx),
                    None => Err(TupleError::UnknownVersion(describe_version(
                        record.properties.version.as_ref(),
                    ))),
                };

                match normalized {
                    Ok(event) => batcher.push(event).await?,
                    Err(error) => {
                        tuples_skipped += 1;
                        tracing::warn!(
                            resource_id = %record.resource_id,
                            rule = %group.rule,
                            tuple = %tuple,
                            %error,
                            "skipping flow tuple"
                        );
                    }
                }
            }
        }
    }

    batcher.flush().await?;

    let outcome = DocumentOutcome {
        events_sent: batcher.events_sent(),
        batches_sent: batcher.batches_sent(),
        tuples_skipped,
    };

    tracing::info!(
        events_sent = outcome.events_sent,
        batches_sent = outcome.batches_sent,
        tuples_skipped = outcome.tuples_skipped,
        "document processed"
    );

    Ok(outcome)
}
