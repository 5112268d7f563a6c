//! sqlx-backed executors.

use crate::{SqlExecutor, SqlValue, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Connection DSN; the scheme selects the backend.
    pub url: String,
    /// Maximum connections in pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum connections in pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection acquire timeout.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Connection idle timeout.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime.
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_max_lifetime() -> u64 {
    1800
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
        }
    }
}

impl DbConfig {
    /// Settings for the given DSN with default pool limits.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    fn is_postgres(&self) -> bool {
        self.url.starts_with("postgres://") || self.url.starts_with("postgresql://")
    }

    fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.max_connections == 0 || self.min_connections > self.max_connections {
            return Err(StoreError::Executor(
                "min_connections must not exceed max_connections, which must be at least 1"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Open a pool for `config.url` and verify it answers.
#[instrument(skip(config))]
pub async fn connect(config: &DbConfig) -> Result<Arc<dyn SqlExecutor>, StoreError> {
    config.validate()?;

    if config.is_postgres() {
        Ok(Arc::new(PgExecutor::connect(config).await?))
    } else if config.is_sqlite() {
        Ok(Arc::new(SqliteExecutor::connect(config).await?))
    } else {
        let scheme = config.url.split(':').next().unwrap_or_default();
        Err(StoreError::UnsupportedDsn(scheme.to_string()))
    }
}

/// Postgres executor.
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Open a Postgres pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        let options = PgConnectOptions::from_str(&config.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .max_lifetime(Some(config.max_lifetime()))
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!(max_connections = config.max_connections, "Postgres pool created");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    fn driver_name(&self) -> &str {
        "postgres"
    }

    async fn execute(&self, statement: &str, values: &[SqlValue]) -> Result<u64, StoreError> {
        let mut query = sqlx::query(statement);
        for value in values {
            query = match value {
                SqlValue::Text(s) => query.bind(s.clone()),
                SqlValue::Timestamp(t) => query.bind(*t),
                SqlValue::Null => query.bind(Option::<String>::None),
            };
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn close(&self) {
        info!("Closing Postgres pool");
        self.pool.close().await;
    }
}

/// SQLite executor.
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    /// Open a SQLite pool, creating the database file if needed.
    ///
    /// In-memory databases are limited to one connection so every query
    /// sees the same database.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let max_connections = if config.is_in_memory() {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(config.min_connections.min(max_connections))
            .acquire_timeout(config.acquire_timeout())
            // An idle in-memory connection takes its database with it.
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!(max_connections, "SQLite pool created");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    async fn execute(&self, statement: &str, values: &[SqlValue]) -> Result<u64, StoreError> {
        let mut query = sqlx::query(statement);
        for value in values {
            query = match value {
                SqlValue::Text(s) => query.bind(s.clone()),
                SqlValue::Timestamp(t) => query.bind(*t),
                SqlValue::Null => query.bind(Option::<String>::None),
            };
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn close(&self) {
        info!("Closing SQLite pool");
        self.pool.close().await;
    }
}
