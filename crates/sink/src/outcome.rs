use crate::SinkError;

/// Result of one batch write attempt.
///
/// The batch is atomic from the checkpoint's point of view: either every
/// record in it counts as written, or none does.
#[derive(Debug)]
pub enum BatchOutcome {
    Success {
        /// Raw response body, kept for diagnostics
        response: String,
    },
    Failure {
        error: SinkError,
        /// Raw response body, if the sink answered at all
        response: Option<String>,
    },
}

impl BatchOutcome {
    pub fn success(response: impl Into<String>) -> Self {
        Self::Success {
            response: response.into(),
        }
    }

    pub fn failure(error: SinkError, response: Option<String>) -> Self {
        Self::Failure { error, response }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Success { response } => Some(response),
            Self::Failure { response, .. } => response.as_deref(),
        }
    }
}
