//! In-process queue transport.

use crate::{
    encode_entry, Acknowledgement, Message, MessageHandler, Publisher, QueueClient, QueueError,
    Subscriber,
};
use async_trait::async_trait;
use auditrelay_types::Entry;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for [`MemoryQueue`].
#[derive(Debug, Clone)]
pub struct MemoryQueueConfig {
    /// Delivery attempts before a rejected message is dead-lettered.
    pub max_deliveries: u32,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self { max_deliveries: 5 }
    }
}

/// Counters describing what the queue has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub published: u64,
    pub acked: u64,
    pub rejected: u64,
    pub dead_lettered: u64,
}

/// A redelivering queue backed by a tokio channel.
///
/// Rejected messages go back to the end of the queue with their attempt
/// counter bumped; once `max_deliveries` is reached they are moved to the
/// dead-letter list instead. Only one subscriber receives at a time.
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

struct Inner {
    config: MemoryQueueConfig,
    tx: mpsc::UnboundedSender<Message>,
    rx: Mutex<mpsc::UnboundedReceiver<Message>>,
    closed: CancellationToken,
    next_id: AtomicU64,
    published: AtomicU64,
    acked: AtomicU64,
    rejected: AtomicU64,
    dead_letters: parking_lot::Mutex<Vec<Message>>,
}

impl MemoryQueue {
    /// Create a queue with default settings.
    pub fn new() -> Self {
        Self::with_config(MemoryQueueConfig::default())
    }

    /// Create a queue with the given settings.
    pub fn with_config(config: MemoryQueueConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                config,
                tx,
                rx: Mutex::new(rx),
                closed: CancellationToken::new(),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                acked: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                dead_letters: parking_lot::Mutex::new(Vec::new()),
            }),
        }
    }

    /// Enqueue an already-encoded payload, bypassing entry encoding.
    pub fn publish_raw(&self, payload: impl Into<Bytes>) -> Result<String, QueueError> {
        if self.inner.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }
        let id = format!("mem-{}", self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .tx
            .send(Message::new(id.clone(), payload))
            .map_err(|_| QueueError::Closed)?;
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Current counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            published: self.inner.published.load(Ordering::Relaxed),
            acked: self.inner.acked.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            dead_lettered: self.inner.dead_letters.lock().len() as u64,
        }
    }

    /// Messages that exhausted their delivery attempts.
    pub fn dead_letters(&self) -> Vec<Message> {
        self.inner.dead_letters.lock().clone()
    }

    /// Whether [`QueueClient::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    fn settle(&self, message: Message, ack: Acknowledgement) {
        match ack {
            Acknowledgement::Ack => {
                self.inner.acked.fetch_add(1, Ordering::Relaxed);
            }
            Acknowledgement::Reject => {
                self.inner.rejected.fetch_add(1, Ordering::Relaxed);
                if message.attempt >= self.inner.config.max_deliveries {
                    warn!(
                        message_id = %message.id,
                        attempts = message.attempt,
                        "Message exhausted its deliveries, dead-lettering"
                    );
                    self.inner.dead_letters.lock().push(message);
                } else if self.inner.tx.send(message.redelivery()).is_err() {
                    warn!("Queue channel closed, dropping rejected message");
                }
            }
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MemoryQueue {
    async fn publish(&self, entry: &Entry) -> Result<(), QueueError> {
        let payload = encode_entry(entry)?;
        let id = self.publish_raw(payload)?;
        debug!(message_id = %id, entry_id = %entry.id, "Entry published");
        Ok(())
    }
}

#[async_trait]
impl Subscriber for MemoryQueue {
    async fn receive(
        &self,
        cancel: CancellationToken,
        handler: &dyn MessageHandler,
    ) -> Result<(), QueueError> {
        let mut rx = tokio::select! {
            rx = self.inner.rx.lock() => rx,
            _ = cancel.cancelled() => return Err(QueueError::Cancelled),
        };

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = self.inner.closed.cancelled() => return Err(QueueError::Closed),
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => return Err(QueueError::Closed),
                },
            };

            let outcome = handler.handle(&message).await;
            if let Err(err) = &outcome {
                debug!(message_id = %message.id, attempt = message.attempt, error = %err, "Handler rejected message");
            }
            self.settle(message, Acknowledgement::for_outcome(&outcome));
        }
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    fn publisher(&self) -> Arc<dyn Publisher> {
        Arc::new(self.clone())
    }

    fn subscriber(&self) -> Arc<dyn Subscriber> {
        Arc::new(self.clone())
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.inner.closed.cancel();
        Ok(())
    }
}
