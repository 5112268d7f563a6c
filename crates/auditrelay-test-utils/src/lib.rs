//! Test utilities for Audit Relay crates.

use async_trait::async_trait;
use auditrelay_pipeline::{ConsumeError, ErrorSink, LifecycleError, PipelineSettings, ResourceFactory};
use auditrelay_queue::{MemoryQueue, MemoryQueueConfig, QueueClient};
use auditrelay_store::{SqlExecutor, SqlValue, StoreError};
use auditrelay_types::{Entry, FixedClock};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// `2024-01-02T03:04:05Z`.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
        .single()
        .expect("valid timestamp")
}

/// A clock stopped at [`fixed_time`].
pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(fixed_time()))
}

/// An un-normalized login entry for request `req-1`.
pub fn login_entry() -> Entry {
    Entry::new("login").with_request_id("req-1")
}

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// passes. Returns whether it held.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Run `future`, panicking if it takes longer than `timeout`.
pub async fn within<F: Future>(timeout: Duration, future: F) -> F::Output {
    tokio::time::timeout(timeout, future)
        .await
        .expect("operation timed out")
}

/// One statement seen by a [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// A [`SqlExecutor`] that records statements instead of running them.
pub struct RecordingExecutor {
    driver: String,
    statements: Mutex<Vec<ExecutedStatement>>,
    failing: AtomicBool,
    closes: AtomicUsize,
}

impl RecordingExecutor {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            statements: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn sqlite() -> Arc<Self> {
        Arc::new(Self::new("sqlite"))
    }

    pub fn postgres() -> Arc<Self> {
        Arc::new(Self::new("postgres"))
    }

    /// Make every following `execute` fail (and not record).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn statements(&self) -> Vec<ExecutedStatement> {
        self.statements.lock().clone()
    }

    /// Recorded `INSERT` statements.
    pub fn inserts(&self) -> Vec<ExecutedStatement> {
        self.statements
            .lock()
            .iter()
            .filter(|s| s.sql.starts_with("INSERT"))
            .cloned()
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn execute(&self, statement: &str, values: &[SqlValue]) -> Result<u64, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Executor("injected failure".to_string()));
        }
        self.statements.lock().push(ExecutedStatement {
            sql: statement.to_string(),
            values: values.to_vec(),
        });
        Ok(1)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// An [`ErrorSink`] that keeps every report.
#[derive(Default)]
pub struct CollectingErrorSink {
    reports: Mutex<Vec<(&'static str, String)>>,
}

impl CollectingErrorSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `ConsumeError::kind` of each report, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.reports.lock().iter().map(|(k, _)| *k).collect()
    }

    /// Rendered messages of each report, in order.
    pub fn messages(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorSink for CollectingErrorSink {
    fn report(&self, error: &ConsumeError) {
        self.reports.lock().push((error.kind(), error.to_string()));
    }
}

/// A [`ResourceFactory`] handing out one [`RecordingExecutor`] and one
/// [`MemoryQueue`], counting how often each is requested.
pub struct StaticResourceFactory {
    executor: Arc<RecordingExecutor>,
    queue: MemoryQueue,
    connect_delay: Duration,
    executor_connects: AtomicUsize,
    queue_connects: AtomicUsize,
    fail_queue: AtomicBool,
}

impl StaticResourceFactory {
    pub fn new(executor: Arc<RecordingExecutor>) -> Self {
        Self::with_queue(executor, MemoryQueue::new())
    }

    pub fn with_queue(executor: Arc<RecordingExecutor>, queue: MemoryQueue) -> Self {
        Self {
            executor,
            queue,
            connect_delay: Duration::ZERO,
            executor_connects: AtomicUsize::new(0),
            queue_connects: AtomicUsize::new(0),
            fail_queue: AtomicBool::new(false),
        }
    }

    /// A factory whose queue dead-letters after `max_deliveries` attempts.
    pub fn with_max_deliveries(executor: Arc<RecordingExecutor>, max_deliveries: u32) -> Self {
        Self::with_queue(
            executor,
            MemoryQueue::with_config(MemoryQueueConfig { max_deliveries }),
        )
    }

    /// Sleep this long inside `connect_executor`.
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn set_queue_failing(&self, failing: bool) {
        self.fail_queue.store(failing, Ordering::SeqCst);
    }

    pub fn executor(&self) -> &Arc<RecordingExecutor> {
        &self.executor
    }

    pub fn queue(&self) -> &MemoryQueue {
        &self.queue
    }

    pub fn executor_connects(&self) -> usize {
        self.executor_connects.load(Ordering::SeqCst)
    }

    pub fn queue_connects(&self) -> usize {
        self.queue_connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFactory for StaticResourceFactory {
    async fn connect_executor(
        &self,
        _settings: &PipelineSettings,
    ) -> Result<Arc<dyn SqlExecutor>, LifecycleError> {
        self.executor_connects.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        Ok(self.executor.clone())
    }

    async fn connect_queue(
        &self,
        _settings: &PipelineSettings,
    ) -> Result<Arc<dyn QueueClient>, LifecycleError> {
        self.queue_connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_queue.load(Ordering::SeqCst) {
            return Err(LifecycleError::Queue(auditrelay_queue::QueueError::Transport(
                "injected failure".to_string(),
            )));
        }
        Ok(Arc::new(self.queue.clone()))
    }
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_recording_executor() {
        let executor = RecordingExecutor::sqlite();
        executor
            .execute("INSERT INTO t VALUES (?)", &[SqlValue::Null])
            .await
            .unwrap();
        executor.execute("CREATE TABLE t (v TEXT)", &[]).await.unwrap();

        assert_eq!(executor.statements().len(), 2);
        assert_eq!(executor.inserts().len(), 1);

        executor.set_failing(true);
        assert_err!(executor.execute("INSERT INTO t VALUES (?)", &[]).await);
        assert_eq!(executor.inserts().len(), 1);

        executor.close().await;
        assert_eq!(executor.close_count(), 1);
    }

    #[tokio::test]
    async fn test_wait_until() {
        assert!(wait_until(Duration::from_millis(50), || true).await);
        assert!(!wait_until(Duration::from_millis(20), || false).await);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingErrorSink::new();
        assert!(sink.is_empty());
        sink.report(&ConsumeError::Subscription(
            auditrelay_queue::QueueError::Closed,
        ));
        assert_eq!(sink.kinds(), vec!["subscription"]);
        assert!(sink.messages()[0].contains("closed"));
    }

    proptest! {
        #[test]
        fn test_recorded_values_keep_their_order(texts in prop::collection::vec("\\PC*", 0..8)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let values: Vec<SqlValue> = texts.into_iter().map(SqlValue::Text).collect();

            let executor = RecordingExecutor::postgres();
            rt.block_on(executor.execute("INSERT INTO t VALUES ($1)", &values)).unwrap();

            prop_assert_eq!(&executor.inserts()[0].values, &values);
        }
    }
}
