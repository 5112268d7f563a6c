//! The canonical audit record.

use crate::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audit record: who did what, on which endpoint, with what payload.
///
/// An entry is plain data. [`crate::normalize`] is what guarantees that an
/// entry has an id, an action and a timestamp before it leaves the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier; empty until normalized.
    #[serde(default)]
    pub id: String,
    /// Correlates the entry with the request that produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Who performed the action.
    #[serde(default, alias = "actor", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// What was done. The only required field.
    pub action: String,
    /// Endpoint or resource the action targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Payload>,
    /// Response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Payload>,
    /// When the action happened; set at normalization when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// Create an entry for `action` with every other field unset.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the request ID.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the actor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }

    /// Set the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Attach a request payload.
    pub fn with_request(mut self, payload: impl Into<Payload>) -> Self {
        self.request = Some(payload.into());
        self
    }

    /// Attach a response payload.
    pub fn with_response(mut self, payload: impl Into<Payload>) -> Self {
        self.response = Some(payload.into());
        self
    }

    /// Set the timestamp.
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Whether the entry already satisfies the normalized-entry invariants.
    pub fn is_normalized(&self) -> bool {
        !self.id.is_empty() && !self.action.trim().is_empty() && self.created_at.is_some()
    }
}
