use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use product_sink::{BatchOutcome, BatchSink};
use sync_core::{decode_product, Backoff, OffsetSet, Product, RawMessage};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::observer::{IngestObserver, TracingObserver};
use crate::client::{Fetch, LogClient};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    Fetching,
    Decoding,
    Writing,
    Committing,
    BackingOff,
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Decoding => "decoding",
            Self::Writing => "writing",
            Self::Committing => "committing",
            Self::BackingOff => "backing_off",
        };
        f.write_str(name)
    }
}

/// What one iteration of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The batch was written. `committed` is false when the log refused the
    /// commit; the batch then stays eligible for redelivery.
    Committed {
        offsets: OffsetSet,
        records: usize,
        committed: bool,
    },
    /// The write failed; the consumer was rewound to `target` and the loop
    /// slept for `delay`.
    RolledBack { target: OffsetSet, delay: Duration },
    /// The log client closed or the loop was cancelled.
    Closed,
}

/// Counters accumulated over the lifetime of a loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub batches: u64,
    pub messages_fetched: u64,
    pub records_written: u64,
    pub decode_failures: u64,
    pub write_failures: u64,
    pub commit_failures: u64,
}

impl IngestSummary {
    pub fn merge(&mut self, other: &IngestSummary) {
        self.batches += other.batches;
        self.messages_fetched += other.messages_fetched;
        self.records_written += other.records_written;
        self.decode_failures += other.decode_failures;
        self.write_failures += other.write_failures;
        self.commit_failures += other.commit_failures;
    }
}

/// At-least-once checkpoint coordinator between a log and a sink.
///
/// Offsets are committed only after the sink confirms a batch. On a failed
/// write the log client is rewound to the last committed offsets and the
/// same region is fetched again after a backoff delay. The committed offset
/// set is owned by the loop. It changes after a successful commit, and is
/// re-read from the log before every rollback so that a commit made by
/// another group member is never rewound past.
pub struct IngestLoop<L, S, O = TracingObserver> {
    log: L,
    sink: Arc<S>,
    observer: O,
    backoff: Backoff,
    committed: Option<OffsetSet>,
    state: IngestState,
    consecutive_failures: u32,
    summary: IngestSummary,
}

impl<L, S> IngestLoop<L, S, TracingObserver>
where
    L: LogClient,
    S: BatchSink,
{
    pub fn new(log: L, sink: Arc<S>, backoff: Backoff) -> Self {
        Self::with_observer(log, sink, backoff, TracingObserver)
    }
}

impl<L, S, O> IngestLoop<L, S, O>
where
    L: LogClient,
    S: BatchSink,
    O: IngestObserver,
{
    pub fn with_observer(log: L, sink: Arc<S>, backoff: Backoff, observer: O) -> Self {
        Self {
            log,
            sink,
            observer,
            backoff,
            committed: None,
            state: IngestState::Idle,
            consecutive_failures: 0,
            summary: IngestSummary::default(),
        }
    }

    /// Run until the log client closes or `cancel` fires.
    ///
    /// Only fetch-level errors end the loop with `Err`; sink and commit
    /// failures are retried indefinitely.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<IngestSummary> {
        loop {
            if let Step::Closed = self.step(cancel).await? {
                break;
            }
        }

        info!(
            "Ingestion stopped: {} batches, {} messages fetched, {} records written, {} decode failures, {} write failures, {} commit failures",
            self.summary.batches,
            self.summary.messages_fetched,
            self.summary.records_written,
            self.summary.decode_failures,
            self.summary.write_failures,
            self.summary.commit_failures
        );
        Ok(self.summary.clone())
    }

    /// Run exactly one fetch / decode / write / commit-or-rollback cycle.
    pub async fn step(&mut self, cancel: &CancellationToken) -> Result<Step> {
        if cancel.is_cancelled() {
            return Ok(Step::Closed);
        }

        let committed = match self.committed.take() {
            Some(committed) => committed,
            None => self.log.committed_offsets().await?,
        };
        let committed = self.committed.insert(committed).clone();

        self.transition(IngestState::Fetching);
        let batch = match self.log.fetch(cancel).await {
            Ok(Fetch::Records(batch)) => batch,
            Ok(Fetch::Closed) => {
                self.transition(IngestState::Idle);
                return Ok(Step::Closed);
            }
            Err(e) => {
                self.transition(IngestState::Idle);
                return Err(e);
            }
        };
        self.observer.on_fetch(&batch);
        self.summary.batches += 1;
        self.summary.messages_fetched += batch.len() as u64;

        self.transition(IngestState::Decoding);
        let records = self.decode(&batch);

        self.transition(IngestState::Writing);
        let outcome = self.sink.write_batch(&records).await;
        self.observer.on_write(records.len(), &outcome);

        match outcome {
            BatchOutcome::Success { .. } => {
                Ok(self.commit(&committed, &batch, records.len()).await)
            }
            BatchOutcome::Failure { .. } => self.roll_back(committed, &batch, cancel).await,
        }
    }

    fn decode(&mut self, batch: &[RawMessage]) -> Vec<Product> {
        let mut records = Vec::with_capacity(batch.len());
        for message in batch {
            match decode_product(message) {
                Ok(product) => records.push(product),
                Err(e) => {
                    self.summary.decode_failures += 1;
                    self.observer.on_decode_error(message, &e);
                }
            }
        }
        records
    }

    async fn commit(
        &mut self,
        committed: &OffsetSet,
        batch: &[RawMessage],
        records: usize,
    ) -> Step {
        self.transition(IngestState::Committing);
        self.summary.records_written += records as u64;

        // Malformed messages are covered too: they were consumed, just not written.
        let consumed = committed.advanced_by(batch);
        // Only the partitions this batch read from; others may belong to
        // another member of the consumer group.
        let to_commit = consumed.restricted_to(batch);
        let ok = match self.log.commit(&to_commit).await {
            Ok(()) => {
                self.committed = Some(consumed.clone());
                self.observer.on_commit(&to_commit);
                true
            }
            Err(e) => {
                self.summary.commit_failures += 1;
                self.observer.on_commit_error(&to_commit, &e);
                false
            }
        };

        self.backoff.reset();
        self.consecutive_failures = 0;
        self.transition(IngestState::Idle);

        Step::Committed {
            offsets: consumed,
            records,
            committed: ok,
        }
    }

    async fn roll_back(
        &mut self,
        cached: OffsetSet,
        batch: &[RawMessage],
        cancel: &CancellationToken,
    ) -> Result<Step> {
        self.transition(IngestState::BackingOff);
        self.summary.write_failures += 1;

        // Another member of the group may have committed these partitions
        // after a rebalance; never rewind below the durable commit.
        let committed = match self.log.committed_offsets().await {
            Ok(durable) => {
                self.committed = Some(durable.clone());
                durable
            }
            Err(e) => {
                self.observer.on_refresh_error(&e);
                cached
            }
        };

        let target = committed.rollback_target(batch);
        match self.log.reset_position(&target).await {
            Ok(()) => self.observer.on_rollback(&target),
            Err(e) => self.observer.on_rollback_error(&target, &e),
        }

        self.consecutive_failures += 1;
        let delay = self.backoff.next();
        self.observer.on_backoff(self.consecutive_failures, delay);

        tokio::select! {
            _ = cancel.cancelled() => {
                self.transition(IngestState::Idle);
                return Ok(Step::Closed);
            }
            _ = tokio::time::sleep(delay) => {}
        }

        self.transition(IngestState::Idle);
        Ok(Step::RolledBack { target, delay })
    }

    fn transition(&mut self, to: IngestState) {
        let from = self.state;
        self.state = to;
        self.observer.on_transition(from, to);
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Offsets last acknowledged by the log, once the loop has started.
    pub fn committed(&self) -> Option<&OffsetSet> {
        self.committed.as_ref()
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }
}
