//! Record types flowing through the pipeline.

use serde::Serialize;

/// A product listing as indexed in the search sink.
///
/// Created by [`crate::decode_product`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    /// Document identifier used as the sink's `_id`.
    ///
    /// Taken from the payload when present, otherwise derived from the
    /// message coordinates so that redelivery upserts the same document.
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub seller: String,
}

/// A message fetched from the log, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Topic the message was read from
    pub topic: String,
    /// Partition within the topic
    pub partition: i32,
    /// Offset of this message within its partition
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Raw value bytes; empty when the log message had no payload
    pub payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload,
        }
    }

    /// Identifier derived from the message coordinates.
    pub fn coordinate_id(&self) -> String {
        format!("{}-{}-{}", self.topic, self.partition, self.offset)
    }
}
