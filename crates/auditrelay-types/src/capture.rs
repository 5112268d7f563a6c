//! Framework-agnostic request capture.
//!
//! Web framework adapters translate their native request/response types
//! into [`HttpRequest`] and [`HttpResponse`], then call [`build_entry`] and
//! hand the result to a recorder. Nothing here depends on an HTTP stack.

use crate::{Entry, Payload};
use std::collections::HashMap;

/// A captured HTTP request.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Payload>,
    pub headers: HashMap<String, String>,
    pub client_ip: Option<String>,
}

impl HttpRequest {
    /// Create a request with no body or headers.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Attach a body.
    pub fn with_body(mut self, body: impl Into<Payload>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Look up a header, ignoring ASCII case. Blank values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A captured HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: Option<Payload>,
}

impl HttpResponse {
    /// Create a response with no body.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            body: None,
        }
    }

    /// Attach a body.
    pub fn with_body(mut self, body: impl Into<Payload>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Caller-supplied context for a captured request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Who made the request; stored as the entry's actor.
    pub user_id: Option<String>,
    pub request_id: Option<String>,
    /// Overrides the derived `"METHOD path"` action.
    pub action: Option<String>,
    pub service_name: Option<String>,
}

impl RequestContext {
    /// Fill missing user and request IDs from the usual headers
    /// (`X-User-Id`, `X-Request-Id`).
    pub fn from_headers(request: &HttpRequest) -> Self {
        Self {
            user_id: request.header("X-User-Id").map(str::to_string),
            request_id: request.header("X-Request-Id").map(str::to_string),
            ..Default::default()
        }
    }
}

/// Build an entry from a request/response pair.
///
/// The timestamp and identifier are left unset; normalization fills them.
pub fn build_entry(req: &HttpRequest, resp: &HttpResponse, ctx: &RequestContext) -> Entry {
    let action = ctx
        .action
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", req.method, req.path).trim().to_string());

    Entry {
        request_id: ctx.request_id.clone(),
        created_by: ctx.user_id.clone(),
        action,
        endpoint: Some(req.path.clone()).filter(|p| !p.is_empty()),
        request: req.body.clone(),
        response: resp.body.clone(),
        ..Default::default()
    }
}
