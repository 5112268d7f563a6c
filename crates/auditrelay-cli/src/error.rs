//! CLI error types.

use std::io;

use auditrelay_pipeline::{LifecycleError, RecordError};
use auditrelay_store::StoreError;
use auditrelay_types::ValidationError;
use thiserror::Error;

use crate::Exit;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {message}")]
    Config {
        message: String,
        hint: Option<String>,
    },

    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> Exit {
        match self {
            Self::Config { .. } => Exit::ConfigError,
            Self::Io { .. } => Exit::IoError,
            Self::Validation(_) => Exit::ValidationError,
            Self::Lifecycle(e) => lifecycle_exit(e),
            Self::Record(RecordError::Validation(_)) => Exit::ValidationError,
            Self::Record(RecordError::Publish(_)) => Exit::NetworkError,
            Self::Store(e) => store_exit(e),
            Self::Other(_) => Exit::GeneralError,
        }
    }

    /// Get hint for this error if available
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            hint: None,
        }
    }

    /// Create a config error with hint
    pub fn config_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Create an IO error
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

fn lifecycle_exit(error: &LifecycleError) -> Exit {
    match error {
        LifecycleError::InvalidSetting { .. } | LifecycleError::Config(_) => Exit::ConfigError,
        LifecycleError::Store(e) => store_exit(e),
        LifecycleError::Queue(_) => Exit::NetworkError,
        LifecycleError::Record(RecordError::Validation(_)) => Exit::ValidationError,
        LifecycleError::Record(RecordError::Publish(_)) => Exit::NetworkError,
        _ => Exit::GeneralError,
    }
}

fn store_exit(error: &StoreError) -> Exit {
    match error {
        StoreError::InvalidTableName(_)
        | StoreError::UnknownPlaceholder(_)
        | StoreError::UnsupportedDsn(_) => Exit::ConfigError,
        StoreError::InvalidEntry(_) | StoreError::Encode(_) => Exit::ValidationError,
        StoreError::Database(_) | StoreError::Executor(_) => Exit::NetworkError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditrelay_pipeline::LifecycleError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::config("x").exit_code(), Exit::ConfigError);
        assert_eq!(
            CliError::from(ValidationError::MissingAction).exit_code(),
            Exit::ValidationError
        );
        assert_eq!(
            CliError::from(StoreError::InvalidTableName("a-b".into())).exit_code(),
            Exit::ConfigError
        );
        assert_eq!(
            CliError::from(LifecycleError::InvalidSetting {
                key: "AUDIT_MAX_DELIVERIES".into(),
                message: "expected a positive integer".into(),
            })
            .exit_code(),
            Exit::ConfigError
        );
        assert_eq!(
            CliError::from(LifecycleError::NotInitialized).exit_code(),
            Exit::GeneralError
        );
        assert_eq!(
            CliError::from(anyhow::anyhow!("boom")).exit_code(),
            Exit::GeneralError
        );
    }

    #[test]
    fn test_hint() {
        let err = CliError::config_with_hint("no queue", "set AUDIT_QUEUE_BACKEND=redis");
        assert_eq!(err.hint(), Some("set AUDIT_QUEUE_BACKEND=redis"));
        assert!(CliError::config("no queue").hint().is_none());
    }
}
