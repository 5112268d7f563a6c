//! Delivered messages and handler outcomes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// A message delivered by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Transport-assigned message ID.
    pub id: String,
    /// Encoded entry.
    pub payload: Bytes,
    /// Delivery attempt, starting at 1.
    pub attempt: u32,
}

impl Message {
    /// Create a first-attempt message.
    pub fn new(id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            attempt: 1,
        }
    }

    /// The same message, scheduled for its next delivery attempt.
    pub fn redelivery(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }
}

/// Why a handler refused a message.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload is not a valid encoded entry.
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),

    /// The message decoded but could not be processed.
    #[error("message rejected: {0}")]
    Rejected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap a processing failure.
    pub fn rejected(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Rejected(Box::new(err))
    }
}

/// What a transport does with a message after its handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Remove the message from the queue.
    Ack,
    /// Hand the message back for redelivery or dead-lettering.
    Reject,
}

impl Acknowledgement {
    /// Ack on success, reject on any handler error.
    pub fn for_outcome(outcome: &Result<(), HandlerError>) -> Self {
        match outcome {
            Ok(()) => Self::Ack,
            Err(_) => Self::Reject,
        }
    }
}

/// Receives messages from a subscriber.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one message. Returning `Ok` acknowledges it.
    async fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}
