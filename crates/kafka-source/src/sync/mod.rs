//! Kafka to sink ingestion.
//!
//! [`IngestLoop`] is the checkpoint coordinator: it fetches a batch, decodes
//! it, writes it through a [`product_sink::BatchSink`], and then either
//! commits the batch's offsets or rewinds to the last commit and backs off.
//! [`run_ingest`] wires one or more loops to Kafka consumers in the same
//! consumer group.

mod ingest;
mod observer;
mod run;


pub use ingest::{IngestLoop, IngestState, IngestSummary, Step};
pub use observer::{IngestObserver, TracingObserver};
pub use run::{run_ingest, Config};
