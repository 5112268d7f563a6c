//! The audit event pipeline.
//!
//! ```text
//! caller -> Recorder -> Publisher -> [queue] -> Subscriber -> Consumer -> EntryStore
//! ```
//!
//! [`Recorder`] validates and publishes entries. [`Consumer`] drains the
//! queue into an [`EntryStore`](auditrelay_store::EntryStore), acknowledging
//! a message only once it is stored. [`AuditRuntime`] wires both from
//! configuration, runs the consumer in the background and tears everything
//! down again on shutdown.

mod consumer;
mod error;
mod error_sink;
mod factory;
mod recorder;
mod runtime;
mod settings;

pub use consumer::Consumer;
pub use error::{ConsumeError, LifecycleError, RecordError};
pub use error_sink::{ErrorSink, LogErrorSink, NoopErrorSink};
pub use factory::{DefaultResourceFactory, ResourceFactory};
pub use recorder::Recorder;
pub use runtime::{AuditRuntime, LifecycleState};
pub use settings::{PipelineSettings, QueueBackend};
