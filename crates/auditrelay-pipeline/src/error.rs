//! Pipeline errors.

use auditrelay_common_config::ConfigError;
use auditrelay_queue::QueueError;
use auditrelay_store::StoreError;
use auditrelay_types::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Why an entry could not be recorded.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to publish audit entry: {0}")]
    Publish(#[from] QueueError),
}

/// A failure on the consume side, reported to an
/// [`ErrorSink`](crate::ErrorSink).
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("failed to decode audit message {message_id}: {source}")]
    Decode {
        message_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to store audit entry {entry_id}: {source}")]
    Store {
        entry_id: String,
        #[source]
        source: StoreError,
    },

    /// The subscription itself ended with an error.
    #[error("audit subscription ended: {0}")]
    Subscription(#[source] QueueError),
}

impl ConsumeError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::Store { .. } => "store",
            Self::Subscription(_) => "subscription",
        }
    }
}

/// Errors from [`AuditRuntime`](crate::AuditRuntime).
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("audit runtime is already initializing")]
    AlreadyInitializing,

    #[error("audit runtime is not initialized")]
    NotInitialized,

    #[error("audit runtime is shutting down")]
    ShuttingDown,

    #[error("audit runtime did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("invalid value for {key}: {message}")]
    InvalidSetting { key: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl LifecycleError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
