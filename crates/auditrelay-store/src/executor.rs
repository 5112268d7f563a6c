//! The SQL execution port.

use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A value bound to a positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Timestamp(DateTime<Utc>),
    Null,
}

impl SqlValue {
    /// Text, or `Null` when the text is missing or blank.
    pub fn nullable_text(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => Self::Text(v.to_string()),
            _ => Self::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Executes statements against a database handle.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Name of the underlying driver, used for placeholder detection.
    fn driver_name(&self) -> &str;

    /// Execute one statement with positional values; returns rows affected.
    async fn execute(&self, statement: &str, values: &[SqlValue]) -> Result<u64, StoreError>;

    /// Close the handle. Later executions fail.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_text() {
        assert_eq!(SqlValue::nullable_text(None), SqlValue::Null);
        assert_eq!(SqlValue::nullable_text(Some("")), SqlValue::Null);
        assert_eq!(SqlValue::nullable_text(Some("  ")), SqlValue::Null);
        assert_eq!(
            SqlValue::nullable_text(Some(" req-1")),
            SqlValue::Text(" req-1".to_string())
        );
    }
}
