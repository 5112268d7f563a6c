//! Consume side of the pipeline.

use crate::{ConsumeError, ErrorSink};
use async_trait::async_trait;
use auditrelay_common_log::spans::{message_span, record_entry_id, record_error, Timer};
use auditrelay_queue::{
    decode_entry, CancellationToken, HandlerError, Message, MessageHandler, QueueError, Subscriber,
};
use auditrelay_store::EntryStore;
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Drains a subscription into an [`EntryStore`].
///
/// A message is acknowledged only after its entry is stored. Messages that
/// fail to decode or store are reported to the [`ErrorSink`] and rejected;
/// neither ends the subscription.
pub struct Consumer {
    subscriber: Arc<dyn Subscriber>,
    handler: PersistHandler,
}

struct PersistHandler {
    store: Arc<dyn EntryStore>,
    errors: Arc<dyn ErrorSink>,
}

impl Consumer {
    pub fn new(
        subscriber: Arc<dyn Subscriber>,
        store: Arc<dyn EntryStore>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            subscriber,
            handler: PersistHandler { store, errors },
        }
    }

    /// Consume until `cancel` fires or the subscription fails.
    ///
    /// Returns the subscriber's terminal error; cancellation surfaces as
    /// [`QueueError::Cancelled`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), QueueError> {
        self.subscriber.receive(cancel, &self.handler).await
    }
}

impl PersistHandler {
    fn reject(&self, err: ConsumeError) -> HandlerError {
        record_error(&err);
        self.errors.report(&err);
        HandlerError::rejected(err)
    }
}

#[async_trait]
impl MessageHandler for PersistHandler {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let span = message_span(&message.id, message.attempt);
        async move {
            let entry = decode_entry(&message.payload).map_err(|source| {
                self.reject(ConsumeError::Decode {
                    message_id: message.id.clone(),
                    source,
                })
            })?;
            record_entry_id(&entry.id);

            let timer = Timer::start("audit_insert");
            self.store.insert(&entry).await.map_err(|source| {
                self.reject(ConsumeError::Store {
                    entry_id: entry.id.clone(),
                    source,
                })
            })?;
            timer.finish();

            debug!("Audit entry stored");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
