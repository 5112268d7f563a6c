//! Durable storage for audit entries.
//!
//! [`PersistenceStore`] turns a normalized entry into a single positional
//! insert and hands it to a [`SqlExecutor`]. The executor is the only part
//! that knows about a concrete database; sqlx-backed executors for Postgres
//! and SQLite are provided by [`connect`].

mod error;
mod executor;
mod placeholder;
mod pool;
mod store;

pub use error::StoreError;
pub use executor::{SqlExecutor, SqlValue};
pub use placeholder::PlaceholderStyle;
pub use pool::{connect, DbConfig, PgExecutor, SqliteExecutor};
pub use store::{EntryStore, PersistenceStore, StoreConfig, COLUMNS, DEFAULT_TABLE};
