//! Span helpers shared by the pipeline.

use tracing::{debug_span, info_span, Span};

/// Span around the background consume loop.
pub fn consumer_span(table: &str) -> Span {
    info_span!("audit_consumer", table = %table)
}

/// Span around handling one delivered message.
pub fn message_span(message_id: &str, attempt: u32) -> Span {
    debug_span!(
        "audit_message",
        id = %message_id,
        attempt,
        entry_id = tracing::field::Empty,
        error = tracing::field::Empty
    )
}

/// Span around one `record` call.
pub fn record_span(action: &str) -> Span {
    debug_span!(
        "audit_record",
        action = %action,
        entry_id = tracing::field::Empty,
        error = tracing::field::Empty
    )
}

/// Record the entry ID on the current span, if it declared the field.
pub fn record_entry_id(entry_id: &str) {
    Span::current().record("entry_id", entry_id);
}

/// Record an error on the current span, if it declared the field.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}

/// Measures how long an operation took and logs it at debug level.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    pub fn finish(self) {
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %self.start.elapsed().as_millis(),
            "operation completed"
        );
    }
}
