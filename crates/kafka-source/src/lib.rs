//! Kafka source for product-sync.
//!
//! This crate provides:
//! - [`LogClient`], the seam between the ingestion loop and the partitioned log
//! - [`KafkaConsumer`], the `rdkafka` implementation with manual offset management
//! - [`IngestLoop`], the fetch / decode / write / commit-or-rollback state machine
//!
//! # Delivery guarantee
//!
//! Offsets are committed only after the sink confirms a batch. A failed write
//! rewinds the consumer to the last committed offsets and retries after a
//! backoff, so every record is written at least once. Records may be written
//! more than once; the sink is expected to upsert by record id.

/// Log client trait and fetch result
pub mod client;

/// `rdkafka` consumer with manual commits and seek-based rollback
pub mod consumer;
pub mod error;
pub mod sync;

pub use client::{Fetch, LogClient};
pub use consumer::{ConsumerConfig, KafkaConsumer};
pub use error::{Error, Result};
pub use sync::{
    run_ingest, Config, IngestLoop, IngestObserver, IngestState, IngestSummary, Step,
    TracingObserver,
};
