//! Secret values and secret stores.

use crate::ConfigError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A value that is redacted in logs, debug output and serialization, and
/// wiped from memory on drop.
///
/// ```rust
/// use auditrelay_common_config::Secret;
///
/// let dsn = Secret::new("postgres://audit:hunter2@db/audit".to_string());
/// assert_eq!(format!("{}", dsn), "[REDACTED]");
/// assert_eq!(dsn.expose(), "postgres://audit:hunter2@db/audit");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the secret value.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<'de, T: Zeroize + Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Secret::new)
    }
}

impl<T: Zeroize + Serialize> Serialize for Secret<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        "[REDACTED]".serialize(serializer)
    }
}

pub type SecretString = Secret<String>;

/// A store of named secrets, consulted after the environment.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Look up `key`. `Ok(None)` means the store has no such secret.
    async fn get_secret(&self, key: &str) -> Result<Option<SecretString>, ConfigError>;
}

/// In-memory secret store.
#[derive(Default)]
pub struct MapSecretProvider {
    secrets: RwLock<HashMap<String, SecretString>>,
}

impl MapSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a secret.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.secrets
            .write()
            .insert(key.into(), Secret::new(value.into()));
    }

    pub fn with_secret(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSecretProvider {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let provider = Self::new();
        for (key, value) in iter {
            provider.insert(key, value);
        }
        provider
    }
}

#[async_trait]
impl SecretProvider for MapSecretProvider {
    async fn get_secret(&self, key: &str) -> Result<Option<SecretString>, ConfigError> {
        Ok(self.secrets.read().get(key).cloned())
    }
}
