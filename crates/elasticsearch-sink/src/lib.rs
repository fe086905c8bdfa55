//! Elasticsearch sink for product-sync.
//!
//! Writes product batches through the `_bulk` API as newline-delimited
//! `index` actions keyed by product id, so replaying a batch after a failed
//! attempt overwrites the same documents instead of duplicating them.

mod bulk;
mod sink;

pub use bulk::{encode_bulk_body, BulkSummary};
pub use sink::{ElasticsearchConfig, ElasticsearchSink};
