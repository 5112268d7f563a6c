//! The persistence store.

use crate::{PlaceholderStyle, SqlExecutor, SqlValue, StoreError};
use async_trait::async_trait;
use auditrelay_types::{Entry, Payload};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = "audit_trail";

/// Column order of every insert.
pub const COLUMNS: [&str; 8] = [
    "id",
    "request_id",
    "action",
    "endpoint",
    "request",
    "response",
    "created_at",
    "created_by",
];

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("table name pattern is valid"));

/// Where and how entries are written.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Target table. Empty means [`DEFAULT_TABLE`].
    pub table: String,
    pub placeholder: PlaceholderStyle,
}

impl StoreConfig {
    pub fn new(table: impl Into<String>, placeholder: PlaceholderStyle) -> Self {
        Self {
            table: table.into(),
            placeholder,
        }
    }
}

/// Storage seam used by the consumer.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Append one normalized entry.
    async fn insert(&self, entry: &Entry) -> Result<(), StoreError>;

    /// Create the audit table if it does not exist.
    async fn ensure_schema(&self) -> Result<(), StoreError>;
}

/// Appends entries to a SQL table through a [`SqlExecutor`].
///
/// The store borrows the executor; closing it is the owner's job.
pub struct PersistenceStore {
    executor: Arc<dyn SqlExecutor>,
    table: String,
    placeholder: PlaceholderStyle,
    insert_sql: String,
}

impl PersistenceStore {
    /// Validate the table name and fix the placeholder style.
    pub fn new(executor: Arc<dyn SqlExecutor>, config: StoreConfig) -> Result<Self, StoreError> {
        let table = if config.table.trim().is_empty() {
            DEFAULT_TABLE.to_string()
        } else {
            config.table
        };
        if !TABLE_NAME.is_match(&table) {
            return Err(StoreError::InvalidTableName(table));
        }

        let placeholder = config.placeholder.resolve(executor.driver_name());
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            COLUMNS.join(", "),
            placeholder.placeholders(COLUMNS.len())
        );
        debug!(%table, %placeholder, "Persistence store ready");

        Ok(Self {
            executor,
            table,
            placeholder,
            insert_sql,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The resolved style; never `Auto`.
    pub fn placeholder(&self) -> PlaceholderStyle {
        self.placeholder
    }

    pub fn insert_statement(&self) -> &str {
        &self.insert_sql
    }

    /// DDL issued by [`EntryStore::ensure_schema`].
    pub fn schema_statement(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             id VARCHAR(64) PRIMARY KEY,\n    \
             request_id VARCHAR(128) NULL,\n    \
             action VARCHAR(255) NOT NULL,\n    \
             endpoint TEXT NULL,\n    \
             request TEXT NULL,\n    \
             response TEXT NULL,\n    \
             created_at TIMESTAMP NOT NULL,\n    \
             created_by VARCHAR(255) NULL\n)",
            self.table
        )
    }

    /// Values bound by an insert, in [`COLUMNS`] order.
    pub fn insert_values(entry: &Entry) -> Result<Vec<SqlValue>, StoreError> {
        let created_at = entry.created_at.ok_or(StoreError::InvalidEntry("created_at"))?;
        if entry.id.is_empty() {
            return Err(StoreError::InvalidEntry("id"));
        }

        Ok(vec![
            SqlValue::Text(entry.id.clone()),
            SqlValue::nullable_text(entry.request_id.as_deref()),
            SqlValue::Text(entry.action.clone()),
            SqlValue::nullable_text(entry.endpoint.as_deref()),
            payload_value(entry.request.as_ref())?,
            payload_value(entry.response.as_ref())?,
            SqlValue::Timestamp(created_at),
            SqlValue::nullable_text(entry.created_by.as_deref()),
        ])
    }
}

fn payload_value(payload: Option<&Payload>) -> Result<SqlValue, StoreError> {
    let text = match payload {
        Some(p) => p.to_column_text()?,
        None => None,
    };
    Ok(text.map_or(SqlValue::Null, SqlValue::Text))
}

#[async_trait]
impl EntryStore for PersistenceStore {
    #[instrument(skip(self, entry), fields(table = %self.table, id = %entry.id))]
    async fn insert(&self, entry: &Entry) -> Result<(), StoreError> {
        let values = Self::insert_values(entry)?;
        self.executor.execute(&self.insert_sql, &values).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.executor.execute(&self.schema_statement(), &[]).await?;
        debug!("Audit table ensured");
        Ok(())
    }
}
