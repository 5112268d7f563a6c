//! Runtime settings resolved from configuration.

use crate::LifecycleError;
use auditrelay_common_config::{env::parse_bool, vars, ConfigProvider, Secret, SecretString};
use auditrelay_queue::MemoryQueueConfig;
#[cfg(feature = "redis")]
use auditrelay_queue::RedisStreamConfig;
use auditrelay_store::{DbConfig, PlaceholderStyle, StoreConfig, DEFAULT_TABLE};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Queue transport selected by `AUDIT_QUEUE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueBackend {
    /// In-process queue; entries never leave the process.
    #[default]
    Memory,
    /// Redis Streams.
    Redis,
}

impl FromStr for QueueBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown queue backend {:?}", other)),
        }
    }
}

impl fmt::Display for QueueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        })
    }
}

/// Everything [`AuditRuntime`](crate::AuditRuntime) needs to start.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub queue_backend: QueueBackend,
    pub redis_url: SecretString,
    pub stream: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub max_deliveries: u32,
    pub db_dsn: SecretString,
    pub placeholder: PlaceholderStyle,
    pub table: String,
    pub ensure_schema: bool,
}

impl PipelineSettings {
    /// Configuration keys and the values used when a key is not set.
    pub const DEFAULTS: [(&'static str, &'static str); 10] = [
        (vars::AUDIT_QUEUE_BACKEND, "memory"),
        (vars::AUDIT_REDIS_URL, "redis://127.0.0.1:6379"),
        (vars::AUDIT_STREAM, "audit-trail"),
        (vars::AUDIT_CONSUMER_GROUP, "audit-trail-sub"),
        (vars::AUDIT_CONSUMER_NAME, "auditrelay"),
        (vars::AUDIT_MAX_DELIVERIES, "5"),
        (vars::AUDIT_DB_DSN, "sqlite::memory:"),
        (vars::AUDIT_DB_PLACEHOLDER, "auto"),
        (vars::AUDIT_TABLE, DEFAULT_TABLE),
        (vars::AUDIT_DB_ENSURE_SCHEMA, "false"),
    ];

    /// Read every key from `config` once, falling back to [`Self::DEFAULTS`].
    pub async fn resolve(config: &dyn ConfigProvider) -> Result<Self, LifecycleError> {
        let mut values = HashMap::with_capacity(Self::DEFAULTS.len());
        for (key, default) in Self::DEFAULTS {
            let value = config
                .get_opt(key)
                .await?
                .unwrap_or_else(|| default.to_string());
            values.insert(key, value);
        }
        let lookup = |key: &'static str| values.get(key).map(String::as_str).unwrap_or_default();

        let queue_backend = lookup(vars::AUDIT_QUEUE_BACKEND)
            .parse::<QueueBackend>()
            .map_err(|msg: String| LifecycleError::invalid(vars::AUDIT_QUEUE_BACKEND, msg))?;

        let max_deliveries = match lookup(vars::AUDIT_MAX_DELIVERIES).parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(LifecycleError::invalid(
                    vars::AUDIT_MAX_DELIVERIES,
                    "expected a positive integer",
                ))
            }
        };

        let placeholder = lookup(vars::AUDIT_DB_PLACEHOLDER)
            .parse::<PlaceholderStyle>()
            .map_err(|err| LifecycleError::invalid(vars::AUDIT_DB_PLACEHOLDER, format!("{}", err)))?;

        Ok(Self {
            queue_backend,
            redis_url: Secret::new(lookup(vars::AUDIT_REDIS_URL).to_string()),
            stream: lookup(vars::AUDIT_STREAM).to_string(),
            consumer_group: lookup(vars::AUDIT_CONSUMER_GROUP).to_string(),
            consumer_name: lookup(vars::AUDIT_CONSUMER_NAME).to_string(),
            max_deliveries,
            db_dsn: Secret::new(lookup(vars::AUDIT_DB_DSN).to_string()),
            placeholder,
            table: lookup(vars::AUDIT_TABLE).to_string(),
            ensure_schema: parse_bool(lookup(vars::AUDIT_DB_ENSURE_SCHEMA)),
        })
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.db_dsn.expose().clone())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.table.clone(), self.placeholder)
    }

    pub fn memory_queue_config(&self) -> MemoryQueueConfig {
        MemoryQueueConfig {
            max_deliveries: self.max_deliveries,
        }
    }

    #[cfg(feature = "redis")]
    pub fn redis_config(&self) -> RedisStreamConfig {
        RedisStreamConfig {
            url: self.redis_url.expose().clone(),
            stream: self.stream.clone(),
            group: self.consumer_group.clone(),
            consumer: self.consumer_name.clone(),
            max_deliveries: self.max_deliveries,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditrelay_common_config::LayeredConfig;

    #[tokio::test]
    async fn test_defaults() {
        let settings = PipelineSettings::resolve(&LayeredConfig::isolated())
            .await
            .unwrap();

        assert_eq!(settings.queue_backend, QueueBackend::Memory);
        assert_eq!(settings.stream, "audit-trail");
        assert_eq!(settings.consumer_group, "audit-trail-sub");
        assert_eq!(settings.max_deliveries, 5);
        assert_eq!(settings.db_dsn.expose(), "sqlite::memory:");
        assert_eq!(settings.placeholder, PlaceholderStyle::Auto);
        assert_eq!(settings.table, "audit_trail");
        assert!(!settings.ensure_schema);
    }

    #[tokio::test]
    async fn test_overrides() {
        let config = LayeredConfig::isolated()
            .with_override(vars::AUDIT_QUEUE_BACKEND, "Redis")
            .with_override(vars::AUDIT_MAX_DELIVERIES, "3")
            .with_override(vars::AUDIT_DB_PLACEHOLDER, "dollar")
            .with_override(vars::AUDIT_TABLE, "events")
            .with_override(vars::AUDIT_DB_ENSURE_SCHEMA, "yes");
        let settings = PipelineSettings::resolve(&config).await.unwrap();

        assert_eq!(settings.queue_backend, QueueBackend::Redis);
        assert_eq!(settings.memory_queue_config().max_deliveries, 3);
        assert_eq!(settings.store_config().placeholder, PlaceholderStyle::Dollar);
        assert_eq!(settings.store_config().table, "events");
        assert!(settings.ensure_schema);
    }

    #[tokio::test]
    async fn test_invalid_values() {
        for (key, value) in [
            (vars::AUDIT_QUEUE_BACKEND, "kafka"),
            (vars::AUDIT_MAX_DELIVERIES, "0"),
            (vars::AUDIT_MAX_DELIVERIES, "many"),
            (vars::AUDIT_DB_PLACEHOLDER, "colon"),
        ] {
            let config = LayeredConfig::isolated().with_override(key, value);
            let err = PipelineSettings::resolve(&config).await.unwrap_err();
            assert!(
                matches!(&err, LifecycleError::InvalidSetting { key: k, .. } if k == key),
                "{}={} gave {:?}",
                key,
                value,
                err
            );
        }
    }

    #[test]
    fn test_debug_redacts_connection_strings() {
        let settings = PipelineSettings {
            queue_backend: QueueBackend::Redis,
            redis_url: Secret::new("redis://:pw@cache".into()),
            stream: "s".into(),
            consumer_group: "g".into(),
            consumer_name: "c".into(),
            max_deliveries: 1,
            db_dsn: Secret::new("postgres://audit:pw@db/audit".into()),
            placeholder: PlaceholderStyle::Auto,
            table: "t".into(),
            ensure_schema: false,
        };
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("pw"));
    }
}
