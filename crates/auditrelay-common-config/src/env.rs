//! Environment variable handling.

use crate::ConfigError;
use std::env;
use std::path::Path;

/// Environment variable names.
pub mod vars {
    // Queue
    pub const AUDIT_QUEUE_BACKEND: &str = "AUDIT_QUEUE_BACKEND";
    pub const AUDIT_REDIS_URL: &str = "AUDIT_REDIS_URL";
    pub const AUDIT_STREAM: &str = "AUDIT_STREAM";
    pub const AUDIT_CONSUMER_GROUP: &str = "AUDIT_CONSUMER_GROUP";
    pub const AUDIT_CONSUMER_NAME: &str = "AUDIT_CONSUMER_NAME";
    pub const AUDIT_MAX_DELIVERIES: &str = "AUDIT_MAX_DELIVERIES";

    // Database
    pub const AUDIT_DB_DSN: &str = "AUDIT_DB_DSN";
    pub const AUDIT_DB_PLACEHOLDER: &str = "AUDIT_DB_PLACEHOLDER";
    pub const AUDIT_TABLE: &str = "AUDIT_TABLE";
    pub const AUDIT_DB_ENSURE_SCHEMA: &str = "AUDIT_DB_ENSURE_SCHEMA";

    // Logging
    pub const AUDITRELAY_LOG_LEVEL: &str = "AUDITRELAY_LOG_LEVEL";
    pub const AUDITRELAY_LOG_FORMAT: &str = "AUDITRELAY_LOG_FORMAT";
    pub const AUDITRELAY_LOG_FILE: &str = "AUDITRELAY_LOG_FILE";
    pub const RUST_LOG: &str = "RUST_LOG";

    /// Selects an extra `.env.<name>` file.
    pub const AUDITRELAY_ENV: &str = "AUDITRELAY_ENV";
}

/// Access to the process environment.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Load `.env` files from the working directory.
    ///
    /// `.env.local` and `.env.<AUDITRELAY_ENV>` take precedence over `.env`;
    /// variables already present in the process are never replaced.
    pub fn init() -> Result<Self, ConfigError> {
        Self::init_from(Path::new("."))
    }

    /// Load `.env` files from `dir`. Missing files are skipped.
    pub fn init_from(dir: &Path) -> Result<Self, ConfigError> {
        let mut files = Vec::new();
        if let Some(name) = Self::get(vars::AUDITRELAY_ENV) {
            files.push(format!(".env.{}", name));
        }
        files.push(".env.local".to_string());
        files.push(".env".to_string());

        for file in files {
            match dotenvy::from_path(dir.join(&file)) {
                Ok(()) => {}
                Err(err) if err.not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Self { _guard: () })
    }

    /// Trimmed value of `var`, or `None` when unset or blank.
    pub fn get(var: &str) -> Option<String> {
        env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a required variable.
    pub fn require(var: &str) -> Result<String, ConfigError> {
        Self::get(var).ok_or_else(|| ConfigError::Missing {
            key: var.to_string(),
        })
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        Self::get(var).unwrap_or_else(|| default.to_string())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        Self::get(var).map(|v| parse_bool(&v))
    }
}

/// `true`, `1`, `yes` and `on` (any case) are true; anything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
