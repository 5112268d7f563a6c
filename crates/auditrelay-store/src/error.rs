use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("unknown placeholder style: {0}")]
    UnknownPlaceholder(String),

    #[error("unsupported database DSN: {0}")]
    UnsupportedDsn(String),

    #[error("entry is missing {0}")]
    InvalidEntry(&'static str),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure reported by a non-sqlx executor.
    #[error("executor error: {0}")]
    Executor(String),
}
