//! Subcommand implementations.

mod record;
mod run;
mod schema;

pub use record::RecordCommand;
pub use run::RunCommand;
pub use schema::SchemaCommand;
