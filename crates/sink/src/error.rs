use thiserror::Error;

/// Why a batch write failed.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode batch: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("sink responded with status {status}")]
    Status { status: u16 },

    #[error("{retryable} of {total} records were rejected by the sink with a retryable status")]
    PartialFailure { retryable: usize, total: usize },
}
