//! The request interceptor pair.
//!
//! Outbound: stamp the current access token. Inbound: classify the response
//! and decide whether it passes through, needs token recovery, or fails
//! (raising at most one notification on the way).

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::debug;

use super::classify::{classify, Classification};
use crate::collaborators::Notifier;
use crate::error::SessionError;

/// Adds `Authorization: Bearer <token>` when a token is held.
pub fn stamp(request: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
    match access_token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Endpoints whose failures are returned to the caller without notifying.
#[derive(Debug, Clone, Default)]
pub struct SilentList {
    patterns: Vec<String>,
}

impl SilentList {
    pub fn new(patterns: Vec<String>) -> Self {
        SilentList {
            patterns: patterns.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| path.contains(p.as_str()))
    }
}

/// What the inbound side decided about a response.
#[derive(Debug)]
pub enum Inbound {
    Pass(Value),
    /// 401: hand the request to token recovery.
    Recover,
    Fail(SessionError),
}

/// Classify a response and raise its notifications.
pub fn inspect(
    status: u16,
    body: Value,
    path: &str,
    silent: &SilentList,
    notifier: &dyn Notifier,
) -> Inbound {
    match classify(status, &body) {
        Classification::Success => Inbound::Pass(body),
        Classification::Unauthorized => {
            debug!(path, "Unauthorized response; recovering token");
            Inbound::Recover
        }
        Classification::Validation(fields) => {
            debug!(path, fields = fields.len(), "Validation failure");
            if !silent.matches(path) {
                for field in &fields {
                    notifier.error(&field.to_string());
                }
            }
            Inbound::Fail(SessionError::ValidationFailed(fields))
        }
        Classification::Application(message) => {
            debug!(path, status, "Request failed: {}", message);
            if !silent.matches(path) {
                notifier.error(&message);
            }
            Inbound::Fail(SessionError::Application {
                status: Some(status),
                message,
            })
        }
    }
}

/// A request that never produced a response (timeout, connection refused).
pub fn transport_failure(
    error: reqwest::Error,
    path: &str,
    silent: &SilentList,
    notifier: &dyn Notifier,
) -> SessionError {
    let error = SessionError::from(error);
    debug!(path, "Transport failure: {}", error);
    if !silent.matches(path) {
        notifier.error(&error.to_string());
    }
    error
}

/// JSON when possible, the raw text otherwise, `Null` for an empty body.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
