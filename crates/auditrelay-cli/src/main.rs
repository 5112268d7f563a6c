//! Audit Relay CLI
//!
//! Main entry point for the `auditrelay` binary.

use std::process::ExitCode;

use auditrelay_common_config::Environment;
use auditrelay_common_log::LogConfig;
use clap::Parser;
use tracing::error;

mod cli;
mod commands;
mod error;

use cli::Cli;
use error::CliError;

/// Application exit codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    IoError = 3,
    NetworkError = 4,
    ValidationError = 5,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // `.env` files feed both logging and the layered config.
    if let Err(e) = Environment::init() {
        eprintln!("error: {e}");
        return Exit::ConfigError.into();
    }

    init_tracing(&cli);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to create Tokio runtime: {e}");
            return Exit::GeneralError.into();
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            error!("{e}");
            if let Some(hint) = e.hint() {
                eprintln!("hint: {hint}");
            }
            e.exit_code().into()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    cli.execute().await
}

fn init_tracing(cli: &Cli) {
    let mut config = LogConfig::from_env();
    if let Some(level) = cli.log_level() {
        config = config.with_level(level);
    }

    if let Err(e) = auditrelay_common_log::init(config) {
        eprintln!("warning: logging disabled: {e}");
    }
}
