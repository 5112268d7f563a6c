//! Run command implementation.

use std::future::Future;
use std::io;
use std::time::Duration;

use auditrelay_pipeline::{AuditRuntime, PipelineSettings, QueueBackend};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CommandContext;
use crate::error::CliError;

/// Consume the queue into the database until Ctrl-C or SIGTERM
#[derive(Debug, Parser)]
pub struct RunCommand {
    /// Seconds to wait for the consumer to stop
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    pub shutdown_timeout: u64,
}

impl RunCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let settings = PipelineSettings::resolve(&ctx.config).await?;
        if settings.queue_backend == QueueBackend::Memory {
            warn!("In-process queue selected; only entries recorded by this process are consumed");
        }

        let runtime = AuditRuntime::new();
        let cancel = CancellationToken::new();
        runtime.initialize(&cancel, &ctx.config).await?;

        let signal = match shutdown_signal() {
            Ok(signal) => signal,
            Err(e) => {
                cancel.cancel();
                runtime
                    .shutdown(Duration::from_secs(self.shutdown_timeout))
                    .await?;
                return Err(CliError::io("failed to install signal handlers", e));
            }
        };
        info!(
            backend = %settings.queue_backend,
            table = %settings.table,
            "Audit relay running, press Ctrl-C to stop"
        );

        let received = signal.await;
        if let Ok(name) = received {
            info!(signal = name, "Shutdown signal received");
        }
        cancel.cancel();
        let stopped = runtime
            .shutdown(Duration::from_secs(self.shutdown_timeout))
            .await;

        received.map_err(|e| CliError::io("failed to listen for shutdown signals", e))?;
        stopped?;
        info!("Audit relay stopped");
        Ok(())
    }
}

/// Install the shutdown handlers and return a future that resolves with the
/// name of the first signal received.
#[cfg(unix)]
fn shutdown_signal() -> io::Result<impl Future<Output = io::Result<&'static str>>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => Ok("SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> io::Result<impl Future<Output = io::Result<&'static str>>> {
    Ok(async { tokio::signal::ctrl_c().await.map(|()| "Ctrl-C") })
}
