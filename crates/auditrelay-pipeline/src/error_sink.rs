//! Where consume-side failures go.

use crate::ConsumeError;
use tracing::error;

/// Receives failures the consumer recovers from on its own.
///
/// Reporting must not block; the consumer calls it inline.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &ConsumeError);
}

impl<F> ErrorSink for F
where
    F: Fn(&ConsumeError) + Send + Sync,
{
    fn report(&self, error: &ConsumeError) {
        self(error)
    }
}

/// Logs every failure at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, err: &ConsumeError) {
        error!(kind = err.kind(), error = %err, "Audit consumer error");
    }
}

/// Discards failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopErrorSink;

impl ErrorSink for NoopErrorSink {
    fn report(&self, _error: &ConsumeError) {}
}
