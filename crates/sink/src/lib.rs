//! Sink trait abstraction.
//!
//! This crate defines the `BatchSink` trait that the ingestion loop writes
//! through, and the `BatchOutcome` it inspects to decide between committing
//! and rolling back. `elasticsearch-sink` provides the production
//! implementation; tests provide in-memory ones.

mod error;
mod outcome;
mod traits;

pub use error::SinkError;
pub use outcome::BatchOutcome;
pub use traits::BatchSink;
