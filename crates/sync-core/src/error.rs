use thiserror::Error;

/// Error returned when a single payload cannot be turned into a [`crate::Product`].
///
/// Decode errors never abort a batch: the ingestion loop reports them and
/// drops the offending message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty payload at {topic}/{partition}@{offset}")]
    EmptyPayload {
        topic: String,
        partition: i32,
        offset: i64,
    },

    #[error("malformed product at {topic}/{partition}@{offset}: {source}")]
    Malformed {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("backoff start ({start_ms}ms) exceeds backoff max ({max_ms}ms)")]
    StartExceedsMax { start_ms: u128, max_ms: u128 },

    #[error("jitter min ({min_ms}ms) exceeds jitter max ({max_ms}ms)")]
    JitterRange { min_ms: u128, max_ms: u128 },

    #[error("backoff factor must be a finite number >= 1.0, got {0}")]
    Factor(f64),
}
