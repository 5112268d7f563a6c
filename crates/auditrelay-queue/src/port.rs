//! Queue capability traits.

use crate::{MessageHandler, QueueError};
use async_trait::async_trait;
use auditrelay_types::Entry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sends entries to a queue.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Encode and send one entry.
    ///
    /// Must not return `Ok` before the transport has accepted the message.
    async fn publish(&self, entry: &Entry) -> Result<(), QueueError>;
}

/// Receives messages from a queue.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Deliver messages to `handler` until `cancel` fires or the transport
    /// fails.
    ///
    /// A message is acknowledged only when the handler returns `Ok`; any
    /// handler error rejects it. Cancellation ends the subscription with
    /// [`QueueError::Cancelled`].
    async fn receive(
        &self,
        cancel: CancellationToken,
        handler: &dyn MessageHandler,
    ) -> Result<(), QueueError>;
}

/// Owns a queue connection and hands out its capabilities.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// The publishing side.
    fn publisher(&self) -> Arc<dyn Publisher>;

    /// The subscribing side.
    fn subscriber(&self) -> Arc<dyn Subscriber>;

    /// Release the connection. Publishing afterwards fails.
    async fn close(&self) -> Result<(), QueueError>;
}
