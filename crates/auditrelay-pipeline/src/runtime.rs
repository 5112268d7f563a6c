//! The audit runtime lifecycle.

use crate::{
    ConsumeError, Consumer, DefaultResourceFactory, ErrorSink, LifecycleError, LogErrorSink,
    PipelineSettings, Recorder, ResourceFactory,
};
use auditrelay_common_config::ConfigProvider;
use auditrelay_common_log::spans::consumer_span;
use auditrelay_queue::{CancellationToken, QueueClient};
use auditrelay_store::{EntryStore, PersistenceStore, SqlExecutor};
use auditrelay_types::{Clock, Entry, SystemClock};
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Observable lifecycle state of an [`AuditRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Running,
    /// Cancelled, waiting for the consumer to stop and resources to close.
    ShuttingDown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
        })
    }
}

enum State {
    Uninitialized,
    Initializing,
    Running(Active),
}

/// Resources owned by one initialize..shutdown cycle.
struct Active {
    generation: u64,
    recorder: Recorder,
    cancel: CancellationToken,
    tracker: TaskTracker,
    queue: Arc<dyn QueueClient>,
    executor: Arc<dyn SqlExecutor>,
}

impl Active {
    async fn close(self) {
        if let Err(err) = self.queue.close().await {
            warn!(error = %err, "Failed to close audit queue client");
        }
        self.executor.close().await;
    }
}

/// Wires a [`Recorder`] and a background [`Consumer`] from configuration
/// and owns them until shutdown.
///
/// One runtime goes through any number of initialize/shutdown cycles. All
/// methods take `&self`; share it behind an `Arc`.
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use auditrelay_common_config::LayeredConfig;
/// use auditrelay_pipeline::AuditRuntime;
/// use auditrelay_queue::CancellationToken;
/// use auditrelay_types::Entry;
/// use std::time::Duration;
///
/// let runtime = AuditRuntime::new();
/// runtime
///     .initialize(&CancellationToken::new(), &LayeredConfig::new())
///     .await?;
/// runtime.record(Entry::new("login").with_actor("alice")).await?;
/// runtime.shutdown(Duration::from_secs(5)).await?;
/// # Ok(())
/// # }
/// ```
pub struct AuditRuntime {
    state: Mutex<State>,
    generation: AtomicU64,
    factory: Arc<dyn ResourceFactory>,
    errors: Arc<dyn ErrorSink>,
    clock: Arc<dyn Clock>,
}

impl Default for AuditRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditRuntime {
    /// A runtime using sqlx, the configured queue backend and logged errors.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Uninitialized),
            generation: AtomicU64::new(0),
            factory: Arc::new(DefaultResourceFactory),
            errors: Arc::new(LogErrorSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn ResourceFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        match &*self.state.lock() {
            State::Uninitialized => LifecycleState::Uninitialized,
            State::Initializing => LifecycleState::Initializing,
            State::Running(active) if active.cancel.is_cancelled() => {
                LifecycleState::ShuttingDown
            }
            State::Running(_) => LifecycleState::Running,
        }
    }

    /// Open resources and start consuming.
    ///
    /// Returns `Ok` without doing anything if the runtime is already
    /// running. The background consumer stops when `parent` is cancelled or
    /// on [`shutdown`](Self::shutdown). On failure, resources opened so far
    /// are closed and the runtime stays uninitialized.
    #[instrument(skip_all)]
    pub async fn initialize(
        &self,
        parent: &CancellationToken,
        config: &dyn ConfigProvider,
    ) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            match &*state {
                State::Running(active) if !active.cancel.is_cancelled() => return Ok(()),
                State::Running(_) => return Err(LifecycleError::ShuttingDown),
                State::Initializing => return Err(LifecycleError::AlreadyInitializing),
                State::Uninitialized => *state = State::Initializing,
            }
        }

        let guard = InitGuard {
            state: &self.state,
            armed: true,
        };
        let active = self.start(parent, config).await?;
        guard.complete(active);

        info!("Audit runtime started");
        Ok(())
    }

    async fn start(
        &self,
        parent: &CancellationToken,
        config: &dyn ConfigProvider,
    ) -> Result<Active, LifecycleError> {
        let settings = PipelineSettings::resolve(config).await?;
        debug!(
            queue = %settings.queue_backend,
            table = %settings.table,
            "Resolved audit settings"
        );

        let executor = self.factory.connect_executor(&settings).await?;
        match self.wire(parent, &settings, executor.clone()).await {
            Ok(active) => Ok(active),
            Err(err) => {
                executor.close().await;
                Err(err)
            }
        }
    }

    async fn wire(
        &self,
        parent: &CancellationToken,
        settings: &PipelineSettings,
        executor: Arc<dyn SqlExecutor>,
    ) -> Result<Active, LifecycleError> {
        let store = PersistenceStore::new(executor.clone(), settings.store_config())?;
        if settings.ensure_schema {
            store.ensure_schema().await?;
        }
        let table = store.table().to_string();

        let queue = self.factory.connect_queue(settings).await?;

        let recorder = Recorder::with_clock(queue.publisher(), self.clock.clone());
        let consumer = Consumer::new(queue.subscriber(), Arc::new(store), self.errors.clone());

        let cancel = parent.child_token();
        let tracker = TaskTracker::new();
        tracker.spawn(
            run_consumer(consumer, cancel.clone(), self.errors.clone())
                .instrument(consumer_span(&table)),
        );
        tracker.close();

        Ok(Active {
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
            recorder,
            cancel,
            tracker,
            queue,
            executor,
        })
    }

    /// Validate and publish `entry`, returning the published entry.
    ///
    /// Fails with [`LifecycleError::NotInitialized`] unless the runtime is
    /// running.
    pub async fn record(&self, entry: Entry) -> Result<Entry, LifecycleError> {
        let recorder = match &*self.state.lock() {
            State::Running(active) if !active.cancel.is_cancelled() => active.recorder.clone(),
            _ => return Err(LifecycleError::NotInitialized),
        };
        Ok(recorder.record(entry).await?)
    }

    /// Stop the consumer and close resources.
    ///
    /// Does nothing unless the runtime is running. If the consumer does not
    /// stop within `timeout`, returns [`LifecycleError::ShutdownTimeout`]
    /// and leaves the runtime shutting down; call again to finish.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), LifecycleError> {
        let (generation, cancel, tracker) = match &*self.state.lock() {
            State::Running(active) => (
                active.generation,
                active.cancel.clone(),
                active.tracker.clone(),
            ),
            _ => return Ok(()),
        };

        cancel.cancel();
        if tokio::time::timeout(timeout, tracker.wait()).await.is_err() {
            warn!(?timeout, "Audit consumer did not stop in time");
            return Err(LifecycleError::ShutdownTimeout(timeout));
        }

        let active = {
            let mut state = self.state.lock();
            match mem::replace(&mut *state, State::Uninitialized) {
                State::Running(active) if active.generation == generation => active,
                other => {
                    *state = other;
                    return Ok(());
                }
            }
        };
        active.close().await;

        info!("Audit runtime stopped");
        Ok(())
    }
}

async fn run_consumer(consumer: Consumer, cancel: CancellationToken, errors: Arc<dyn ErrorSink>) {
    debug!("Audit consumer running");
    match consumer.run(cancel).await {
        Ok(()) => debug!("Audit consumer finished"),
        Err(err) if err.is_cancelled() => debug!("Audit consumer cancelled"),
        Err(err) => {
            error!(error = %err, "Audit consumer stopped");
            errors.report(&ConsumeError::Subscription(err));
        }
    }
}

/// Puts the state back to `Uninitialized` unless initialization completed,
/// including when the initializing future is dropped.
struct InitGuard<'a> {
    state: &'a Mutex<State>,
    armed: bool,
}

impl InitGuard<'_> {
    fn complete(mut self, active: Active) {
        *self.state.lock() = State::Running(active);
        self.armed = false;
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock();
            if matches!(*state, State::Initializing) {
                *state = State::Uninitialized;
            }
        }
    }
}
