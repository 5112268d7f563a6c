//! Record command implementation.

use auditrelay_common_config::vars;
use auditrelay_pipeline::{
    DefaultResourceFactory, PipelineSettings, QueueBackend, Recorder, ResourceFactory,
};
use auditrelay_types::{normalize, Entry, Payload, SystemClock};
use clap::Parser;
use tracing::warn;

use crate::cli::CommandContext;
use crate::error::CliError;

/// Publish one audit entry
#[derive(Debug, Parser)]
pub struct RecordCommand {
    /// What was done
    #[arg(short, long)]
    pub action: String,

    /// Request the entry belongs to
    #[arg(long)]
    pub request_id: Option<String>,

    /// Endpoint or resource acted on
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Who did it
    #[arg(long, visible_alias = "created-by")]
    pub actor: Option<String>,

    /// Request body; JSON when it parses, text otherwise
    #[arg(long)]
    pub request: Option<String>,

    /// Response body; JSON when it parses, text otherwise
    #[arg(long)]
    pub response: Option<String>,

    /// Pretty-print the published entry
    #[arg(long)]
    pub pretty: bool,
}

impl RecordCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let entry = normalize(self.entry(), &SystemClock)?;

        let settings = PipelineSettings::resolve(&ctx.config).await?;
        if settings.queue_backend == QueueBackend::Memory {
            return Err(CliError::config_with_hint(
                "record needs a shared queue; the in-process queue would drop the entry on exit",
                format!("set {}=redis", vars::AUDIT_QUEUE_BACKEND),
            ));
        }

        let queue = DefaultResourceFactory.connect_queue(&settings).await?;
        let published = Recorder::new(queue.publisher()).record(entry).await;
        if let Err(e) = queue.close().await {
            warn!(error = %e, "Failed to close queue client");
        }
        let published = published?;

        let json = if self.pretty {
            serde_json::to_string_pretty(&published)
        } else {
            serde_json::to_string(&published)
        }
        .map_err(anyhow::Error::from)?;
        println!("{json}");
        Ok(())
    }

    fn entry(&self) -> Entry {
        let mut entry = Entry::new(self.action.clone());
        entry.request_id = self.request_id.clone();
        entry.endpoint = self.endpoint.clone();
        entry.created_by = self.actor.clone();
        entry.request = self.request.as_deref().map(parse_payload);
        entry.response = self.response.as_deref().map(parse_payload);
        entry
    }
}

fn parse_payload(raw: &str) -> Payload {
    serde_json::from_str(raw)
        .map(Payload::json)
        .unwrap_or_else(|_| Payload::text(raw))
}
