//! Queue errors.

use thiserror::Error;

/// Errors raised by queue transports.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The subscription was stopped through its cancellation token.
    #[error("subscription cancelled")]
    Cancelled,

    /// The queue client has been closed.
    #[error("queue client is closed")]
    Closed,

    #[error("failed to encode entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl QueueError {
    /// Whether this error only signals a deliberate cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_cancelled() {
        assert!(QueueError::Cancelled.is_cancelled());
        assert!(!QueueError::Closed.is_cancelled());
        assert!(!QueueError::Transport("boom".into()).is_cancelled());
    }
}
