//! Opening the runtime's external resources.

use crate::{LifecycleError, PipelineSettings, QueueBackend};
use async_trait::async_trait;
#[cfg(not(feature = "redis"))]
use auditrelay_common_config::vars;
use auditrelay_queue::{MemoryQueue, QueueClient};
use auditrelay_store::SqlExecutor;
use std::sync::Arc;
use tracing::info;

/// Opens the database handle and queue client for a runtime.
///
/// The runtime owns whatever this returns and closes it on shutdown.
#[async_trait]
pub trait ResourceFactory: Send + Sync {
    async fn connect_executor(
        &self,
        settings: &PipelineSettings,
    ) -> Result<Arc<dyn SqlExecutor>, LifecycleError>;

    async fn connect_queue(
        &self,
        settings: &PipelineSettings,
    ) -> Result<Arc<dyn QueueClient>, LifecycleError>;
}

/// sqlx executors and the configured queue backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResourceFactory;

#[async_trait]
impl ResourceFactory for DefaultResourceFactory {
    async fn connect_executor(
        &self,
        settings: &PipelineSettings,
    ) -> Result<Arc<dyn SqlExecutor>, LifecycleError> {
        Ok(auditrelay_store::connect(&settings.db_config()).await?)
    }

    async fn connect_queue(
        &self,
        settings: &PipelineSettings,
    ) -> Result<Arc<dyn QueueClient>, LifecycleError> {
        match settings.queue_backend {
            QueueBackend::Memory => {
                info!("Using in-process audit queue");
                Ok(Arc::new(MemoryQueue::with_config(
                    settings.memory_queue_config(),
                )))
            }
            #[cfg(feature = "redis")]
            QueueBackend::Redis => {
                let queue =
                    auditrelay_queue::RedisStreamQueue::connect(settings.redis_config()).await?;
                Ok(Arc::new(queue))
            }
            #[cfg(not(feature = "redis"))]
            QueueBackend::Redis => Err(LifecycleError::invalid(
                vars::AUDIT_QUEUE_BACKEND,
                "redis support is not compiled in",
            )),
        }
    }
}
