//! Schema command implementation.

use std::sync::Arc;

use auditrelay_pipeline::{DefaultResourceFactory, PipelineSettings, ResourceFactory};
use auditrelay_store::{EntryStore, PersistenceStore, SqlExecutor};
use clap::Parser;
use tracing::info;

use crate::cli::CommandContext;
use crate::error::CliError;

/// Create the audit table, or print its DDL
#[derive(Debug, Parser)]
pub struct SchemaCommand {
    /// Print the DDL and insert statement instead of executing them
    #[arg(long)]
    pub print: bool,
}

impl SchemaCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let settings = PipelineSettings::resolve(&ctx.config).await?;
        let executor = DefaultResourceFactory.connect_executor(&settings).await?;

        let result = self.apply(&settings, executor.clone()).await;
        executor.close().await;
        result
    }

    async fn apply(
        &self,
        settings: &PipelineSettings,
        executor: Arc<dyn SqlExecutor>,
    ) -> Result<(), CliError> {
        let store = PersistenceStore::new(executor, settings.store_config())?;

        if self.print {
            println!("{};", store.schema_statement());
            println!("{};", store.insert_statement());
            return Ok(());
        }

        store.ensure_schema().await?;
        info!(table = store.table(), "Audit table ready");
        Ok(())
    }
}
