//! Entry validation and normalization.

use crate::{id::new_entry_id, Clock, Entry};
use thiserror::Error;

/// Reasons an entry is refused before it leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `action` is empty or whitespace.
    #[error("audit entry action is required")]
    MissingAction,
}

/// Validate `entry` and fill in its identifier and timestamp.
///
/// A missing `id` is generated and a missing `created_at` is taken from
/// `clock` in UTC. Fields that are already set are left untouched, so
/// normalizing a normalized entry is a no-op.
pub fn normalize(mut entry: Entry, clock: &dyn Clock) -> Result<Entry, ValidationError> {
    if entry.action.trim().is_empty() {
        return Err(ValidationError::MissingAction);
    }
    if entry.id.is_empty() {
        entry.id = new_entry_id();
    }
    if entry.created_at.is_none() {
        entry.created_at = Some(clock.now());
    }
    Ok(entry)
}
