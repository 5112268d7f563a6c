//! CLI argument definitions using clap derive macros.

use auditrelay_common_config::LayeredConfig;
use auditrelay_common_log::LogLevel;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{RecordCommand, RunCommand, SchemaCommand};
use crate::error::CliError;

/// Audit Relay - queue-backed audit trail pipeline
///
/// Publishes audit entries to a queue and persists them to SQL.
#[derive(Debug, Parser)]
#[command(
    name = "auditrelay",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv)
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase verbosity level"
    )]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Suppress non-error logging"
    )]
    pub quiet: bool,

    /// Configuration overrides, taking precedence over the environment
    #[arg(
        long = "set",
        global = true,
        value_name = "KEY=VALUE",
        value_parser = parse_override,
        help = "Override a configuration key (repeatable)"
    )]
    pub overrides: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Consume the queue into the database until Ctrl-C or SIGTERM
    Run(RunCommand),

    /// Publish one audit entry
    Record(RecordCommand),

    /// Create the audit table, or print its DDL
    Schema(SchemaCommand),
}

/// Context passed to all commands
pub struct CommandContext {
    pub config: LayeredConfig,
}

impl Cli {
    /// Level requested on the command line, if any.
    pub fn log_level(&self) -> Option<LogLevel> {
        match (self.quiet, self.verbose) {
            (true, _) => Some(LogLevel::Error),
            (false, 0) => None,
            (false, 1) => Some(LogLevel::Debug),
            (false, _) => Some(LogLevel::Trace),
        }
    }

    /// Environment-backed config with `--set` overrides applied.
    pub fn config(&self) -> LayeredConfig {
        self.overrides
            .iter()
            .fold(LayeredConfig::new(), |config, (key, value)| {
                config.with_override(key.clone(), value.clone())
            })
    }

    /// Execute the selected command
    pub async fn execute(self) -> Result<(), CliError> {
        let ctx = CommandContext {
            config: self.config(),
        };

        match self.command {
            Command::Run(cmd) => cmd.execute(&ctx).await,
            Command::Record(cmd) => cmd.execute(&ctx).await,
            Command::Schema(cmd) => cmd.execute(&ctx).await,
        }
    }
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}
