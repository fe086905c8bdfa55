use std::time::Duration;

use product_sink::BatchOutcome;
use sync_core::{DecodeError, OffsetSet, RawMessage};
use tracing::{debug, error, info, trace, warn};

use super::ingest::IngestState;
use crate::error::Error;

/// Hooks the ingestion loop calls on every transition and outcome.
///
/// All methods default to no-ops so implementations only override what they
/// record. Implementations must be cheap; they run inline on the loop.
pub trait IngestObserver: Send + Sync {
    fn on_transition(&self, _from: IngestState, _to: IngestState) {}

    fn on_fetch(&self, _messages: &[RawMessage]) {}

    /// A message was dropped from its batch because it could not be decoded.
    ///
    /// Its offset is still committed with the rest of the batch.
    fn on_decode_error(&self, _message: &RawMessage, _error: &DecodeError) {}

    fn on_write(&self, _records: usize, _outcome: &BatchOutcome) {}

    fn on_commit(&self, _offsets: &OffsetSet) {}

    fn on_commit_error(&self, _offsets: &OffsetSet, _error: &Error) {}

    fn on_rollback(&self, _target: &OffsetSet) {}

    fn on_rollback_error(&self, _target: &OffsetSet, _error: &Error) {}

    /// The durable commit could not be re-read before a rollback; the loop
    /// falls back to the offsets it last committed itself.
    fn on_refresh_error(&self, _error: &Error) {}

    /// `attempt` counts consecutive failed writes, starting at 1.
    fn on_backoff(&self, _attempt: u32, _delay: Duration) {}
}

/// Observer that reports everything through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl IngestObserver for TracingObserver {
    fn on_transition(&self, from: IngestState, to: IngestState) {
        trace!(%from, %to, "State transition");
    }

    fn on_fetch(&self, messages: &[RawMessage]) {
        debug!("Fetched {} messages", messages.len());
        for message in messages {
            trace!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Fetched message"
            );
        }
    }

    fn on_decode_error(&self, message: &RawMessage, error: &DecodeError) {
        warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Dropping message that failed to decode: {error}"
        );
    }

    fn on_write(&self, records: usize, outcome: &BatchOutcome) {
        match outcome {
            BatchOutcome::Success { response } => {
                info!("Wrote {records} records to sink");
                debug!("Sink response: {response}");
            }
            BatchOutcome::Failure { error, response } => {
                error!("Failed to write {records} records to sink: {error}");
                if let Some(body) = response {
                    error!("Sink response: {body}");
                }
            }
        }
    }

    fn on_commit(&self, offsets: &OffsetSet) {
        info!("Committed offsets {offsets}");
    }

    fn on_commit_error(&self, offsets: &OffsetSet, error: &Error) {
        error!("Failed to commit offsets {offsets}, batch will be redelivered if a later write fails: {error}");
    }

    fn on_rollback(&self, target: &OffsetSet) {
        info!("Rewound consumer to committed offsets {target}");
    }

    fn on_rollback_error(&self, target: &OffsetSet, error: &Error) {
        error!("Failed to rewind consumer to {target}: {error}");
    }

    fn on_refresh_error(&self, error: &Error) {
        warn!("Failed to read committed offsets, rolling back to cached offsets: {error}");
    }

    fn on_backoff(&self, attempt: u32, delay: Duration) {
        warn!(
            "Retrying batch after {:.2}s (consecutive failures: {attempt})",
            delay.as_secs_f64()
        );
    }
}
