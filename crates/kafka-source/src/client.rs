use sync_core::{OffsetSet, RawMessage};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Result of one fetch from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    /// A non-empty batch of messages, in log order per partition
    Records(Vec<RawMessage>),
    /// The client was closed or cancelled; no more batches will follow
    Closed,
}

/// Minimal interface the ingestion loop needs from a partitioned log.
///
/// The loop owns its client exclusively; implementations do not need to
/// support concurrent callers.
#[async_trait::async_trait]
pub trait LogClient: Send + Sync {
    /// Block until at least one message is available or `cancel` fires.
    ///
    /// Errors returned here are treated as fatal by the loop: they mean the
    /// connection to the log is broken, not that a batch failed.
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Fetch>;

    /// Durably record `offsets` as processed.
    async fn commit(&mut self, offsets: &OffsetSet) -> Result<()>;

    /// Rewind the in-memory read position to `offsets`.
    ///
    /// Does not touch the durable commit. The next fetch returns messages
    /// starting at these positions.
    async fn reset_position(&mut self, offsets: &OffsetSet) -> Result<()>;

    /// Offsets currently committed for this consumer.
    async fn committed_offsets(&self) -> Result<OffsetSet>;
}
