//! Core types for the product-sync pipeline.
//!
//! This crate provides the leaf building blocks shared by the Kafka source,
//! the sink writers and the CLI:
//!
//! - [`Product`] - the decoded domain record written to the search index
//! - [`RawMessage`] - an undecoded payload plus its log coordinates
//! - [`OffsetSet`] - per-partition read positions (committed or consumed)
//! - [`Backoff`] - exponential retry delays with jitter
//! - [`decode_product`] - payload to [`Product`] conversion
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── product-sink               (BatchSink trait over Product batches)
//!    ├─── elasticsearch-sink         (bulk writer)
//!    └─── product-sync-kafka-source  (log client adapter + ingestion loop)
//! ```

pub mod backoff;
pub mod decode;
pub mod error;
pub mod offsets;
pub mod types;

pub use backoff::{Backoff, BackoffConfig};
pub use decode::decode_product;
pub use error::{ConfigError, DecodeError};
pub use offsets::{OffsetSet, TopicPartition};
pub use types::{Product, RawMessage};
