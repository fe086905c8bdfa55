//! BatchSink trait definition.

use sync_core::Product;

use crate::BatchOutcome;

/// Trait for writing product batches to a downstream store.
///
/// # Usage Pattern
///
/// The ingestion loop is generic over the sink:
///
/// ```ignore
/// pub struct IngestLoop<L: LogClient, S: BatchSink, O: IngestObserver> { .. }
///
/// match sink.write_batch(&records).await {
///     BatchOutcome::Success { .. } => { /* commit */ }
///     BatchOutcome::Failure { .. } => { /* roll back and back off */ }
/// }
/// ```
///
/// Implementations must not retry internally: one call is one write attempt.
/// Writes must be idempotent per record id, since a batch is replayed in
/// full after any failure.
#[async_trait::async_trait]
pub trait BatchSink: Send + Sync {
    /// Write all `records` in order as a single bulk operation.
    ///
    /// An empty slice is a vacuous success and must not touch the network.
    async fn write_batch(&self, records: &[Product]) -> BatchOutcome;
}
