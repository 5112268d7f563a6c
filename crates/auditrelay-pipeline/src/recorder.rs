//! Producer side of the pipeline.

use crate::RecordError;
use auditrelay_common_log::spans::{record_entry_id, record_span};
use auditrelay_queue::Publisher;
use auditrelay_types::{normalize, Clock, Entry, SystemClock};
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Validates entries and publishes them.
///
/// Cheap to clone; clones share the publisher.
#[derive(Clone)]
pub struct Recorder {
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
}

impl Recorder {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self::with_clock(publisher, Arc::new(SystemClock))
    }

    pub fn with_clock(publisher: Arc<dyn Publisher>, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, clock }
    }

    /// Normalize `entry` and publish it, returning the published entry.
    ///
    /// Validation failures return before any I/O. Publish failures are
    /// returned as-is; nothing is retried or buffered.
    pub async fn record(&self, entry: Entry) -> Result<Entry, RecordError> {
        let span = record_span(&entry.action);
        async move {
            let entry = normalize(entry, self.clock.as_ref())?;
            record_entry_id(&entry.id);

            self.publisher.publish(&entry).await?;
            debug!("Audit entry recorded");
            Ok(entry)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use auditrelay_queue::QueueError;
    use auditrelay_types::{FixedClock, ValidationError};
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture {
        published: Mutex<Vec<Entry>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for Capture {
        async fn publish(&self, entry: &Entry) -> Result<(), QueueError> {
            if self.fail {
                return Err(QueueError::Transport("unavailable".into()));
            }
            self.published.lock().push(entry.clone());
            Ok(())
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()))
    }

    #[tokio::test]
    async fn test_record_normalizes_then_publishes() {
        let publisher = Arc::new(Capture::default());
        let recorder = Recorder::with_clock(publisher.clone(), clock());

        let entry = recorder
            .record(Entry::new("login").with_request_id("req-1"))
            .await
            .unwrap();

        assert_eq!(entry.id.len(), 32);
        assert_eq!(
            entry.created_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
        assert_eq!(*publisher.published.lock(), vec![entry]);
    }

    #[tokio::test]
    async fn test_blank_action_publishes_nothing() {
        let publisher = Arc::new(Capture::default());
        let recorder = Recorder::with_clock(publisher.clone(), clock());

        let err = recorder.record(Entry::new("  \t")).await.unwrap_err();
        assert!(matches!(
            err,
            RecordError::Validation(ValidationError::MissingAction)
        ));
        assert!(publisher.published.lock().is_empty());
    }

    #[tokio::test]
    async fn test_publish_error_is_returned() {
        let publisher = Arc::new(Capture {
            fail: true,
            ..Default::default()
        });
        let recorder = Recorder::with_clock(publisher, clock());

        let err = recorder.record(Entry::new("login")).await.unwrap_err();
        assert!(matches!(err, RecordError::Publish(QueueError::Transport(_))));
    }
}
