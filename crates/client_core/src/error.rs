use shared::error::ApiError;
use thiserror::Error;

/// Why a board or mirror operation had no effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// A local precondition failed; nothing was sent.
    #[error("rejected: {0}")]
    ValidationRejected(String),
    /// The command service failed; the last adopted snapshot is kept.
    #[error("{command} failed: {source}")]
    CommandFailed {
        command: &'static str,
        #[source]
        source: ApiError,
    },
    /// A scheduled poll failed; the next tick retries.
    #[error("active snapshot poll failed: {0}")]
    PollFailed(#[source] ApiError),
}

impl ClientError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::ValidationRejected(reason.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationRejected(_))
    }
}
