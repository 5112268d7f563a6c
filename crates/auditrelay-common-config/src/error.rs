use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration key not set: {key}")]
    Missing { key: String },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("secret store error: {0}")]
    Secret(String),

    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether the key was simply not configured anywhere.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}
