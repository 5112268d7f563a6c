//! Queue ports and transports for Audit Relay.
//!
//! The pipeline only talks to a queue through two capabilities:
//!
//! - [`Publisher`] sends one encoded entry and returns once the transport
//!   has accepted it
//! - [`Subscriber`] delivers messages to a [`MessageHandler`] until it is
//!   cancelled, acknowledging a message only when the handler succeeds
//!
//! [`QueueClient`] owns the connection both capabilities share. Two
//! transports are provided: [`MemoryQueue`] for in-process use and tests,
//! and (with the `redis` feature) a Redis Streams transport.

mod codec;
mod error;
mod memory;
mod message;
mod port;
#[cfg(feature = "redis")]
mod redis_stream;

pub use codec::{decode_entry, encode_entry};
pub use error::QueueError;
pub use memory::{MemoryQueue, MemoryQueueConfig, QueueStats};
pub use message::{Acknowledgement, HandlerError, Message, MessageHandler};
pub use port::{Publisher, QueueClient, Subscriber};
#[cfg(feature = "redis")]
pub use redis_stream::{RedisStreamConfig, RedisStreamQueue};

// Re-export for implementors of the ports.
pub use tokio_util::sync::CancellationToken;
