//! Error taxonomy shared by the session, the refresh coordinator and the client.

use serde::{Deserialize, Serialize};

/// Fixed message surfaced for request timeouts.
pub const TIMEOUT_MESSAGE: &str = "Request timed out";

/// A single field-addressable validation failure returned by the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Every failure the session layer can hand back to a caller.
///
/// The type is `Clone` because a single refresh outcome is fanned out to
/// every request queued behind it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// The access token was rejected. Recovered internally through a refresh
    /// and only surfaced if nothing else handles it.
    #[error("access token expired")]
    AuthExpired,
    /// The refresh failed, or a replayed request was still unauthorized.
    #[error("authentication failed: {0}")]
    AuthInvalid(String),
    #[error("validation failed: {}", join_fields(.0))]
    ValidationFailed(Vec<FieldError>),
    #[error("{message}")]
    Application { status: Option<u16>, message: String },
    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SessionError {
    /// Builds an application error without an HTTP status.
    pub fn application(message: impl Into<String>) -> Self {
        SessionError::Application {
            status: None,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for each variant.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::AuthExpired => "E_AUTH_EXPIRED",
            SessionError::AuthInvalid(_) => "E_AUTH_INVALID",
            SessionError::ValidationFailed(_) => "E_VALIDATION_FAILED",
            SessionError::Application { .. } => "E_APPLICATION",
            SessionError::Timeout => "E_TIMEOUT",
            SessionError::Config(_) => "E_CONFIG",
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return SessionError::Timeout;
        }
        SessionError::Application {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_joins_every_field() {
        let err = SessionError::ValidationFailed(vec![
            FieldError {
                field: "email".to_string(),
                message: "is invalid".to_string(),
            },
            FieldError {
                field: String::new(),
                message: "form rejected".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: email: is invalid; form rejected"
        );
        assert_eq!(err.code(), "E_VALIDATION_FAILED");
    }

    #[test]
    fn timeout_uses_fixed_message() {
        assert_eq!(SessionError::Timeout.to_string(), TIMEOUT_MESSAGE);
        assert_eq!(SessionError::Timeout.code(), "E_TIMEOUT");
    }
}
