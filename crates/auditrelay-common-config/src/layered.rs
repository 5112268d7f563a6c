//! Layered configuration lookup.

use crate::{ConfigError, Environment, SecretProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of configuration values.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Trimmed, non-blank value for `key`, or [`ConfigError::Missing`].
    async fn get(&self, key: &str) -> Result<String, ConfigError>;

    /// Like [`get`](Self::get), but a missing key yields `None`.
    async fn get_opt(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get(key).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_missing() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Resolves a key from, in order: explicit overrides, the process
/// environment, the secret provider and registered defaults.
///
/// Blank values at any layer are skipped.
#[derive(Clone, Default)]
pub struct LayeredConfig {
    overrides: HashMap<String, String>,
    read_env: bool,
    secrets: Option<Arc<dyn SecretProvider>>,
    defaults: HashMap<String, String>,
}

impl LayeredConfig {
    /// A provider that reads the process environment.
    pub fn new() -> Self {
        Self {
            read_env: true,
            ..Default::default()
        }
    }

    /// A provider that ignores the process environment.
    pub fn isolated() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn with_defaults<K, V>(mut self, defaults: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.defaults
            .extend(defaults.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_secret_provider(mut self, secrets: Arc<dyn SecretProvider>) -> Self {
        self.secrets = Some(secrets);
        self
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[async_trait]
impl ConfigProvider for LayeredConfig {
    async fn get(&self, key: &str) -> Result<String, ConfigError> {
        if let Some(value) = self.overrides.get(key).and_then(|v| non_blank(v)) {
            return Ok(value);
        }

        if self.read_env {
            if let Some(value) = Environment::get(key) {
                return Ok(value);
            }
        }

        if let Some(secrets) = &self.secrets {
            if let Some(secret) = secrets.get_secret(key).await? {
                if let Some(value) = non_blank(secret.expose()) {
                    return Ok(value);
                }
            }
        }

        self.defaults
            .get(key)
            .and_then(|v| non_blank(v))
            .ok_or_else(|| ConfigError::Missing {
                key: key.to_string(),
            })
    }
}
