//! Configuration for Audit Relay.
//!
//! Components ask a [`ConfigProvider`] for string values by key. The
//! standard provider, [`LayeredConfig`], consults explicit overrides, the
//! process environment (after `.env` files are loaded by
//! [`Environment::init`]), a [`SecretProvider`] and registered defaults, in
//! that order.

pub mod env;
mod error;
mod layered;
mod secret;

pub use env::{vars, Environment};
pub use error::ConfigError;
pub use layered::{ConfigProvider, LayeredConfig};
pub use secret::{MapSecretProvider, Secret, SecretProvider, SecretString};
