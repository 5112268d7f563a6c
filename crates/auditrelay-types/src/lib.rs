//! Audit entry types for Audit Relay.
//!
//! This crate holds the value types that flow through the pipeline:
//!
//! - [`Entry`], the canonical audit record
//! - [`Payload`], the opaque request/response body
//! - [`normalize`], the single choke point that validates an entry and
//!   fills in its identifier and timestamp
//! - [`capture`], a framework-agnostic way to build entries from HTTP
//!   request/response pairs

pub mod capture;
mod clock;
mod entry;
mod id;
mod normalize;
mod payload;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entry::Entry;
pub use id::new_entry_id;
pub use normalize::{normalize, ValidationError};
pub use payload::Payload;
