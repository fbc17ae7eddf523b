use async_trait::async_trait;
use serde_json::Value;

use crate::error::SessionError;
use crate::models::{IdentitySnapshot, LoginGrant};

/// The four backend calls the session depends on.
///
/// `HttpAuthApi` talks to a real server; tests and embedders can supply
/// their own implementation.
#[async_trait]
pub trait AuthApi: Send + Sync {
    fn get_name(&self) -> &str;

    /// Exchange a username/password pair for a token pair and identity.
    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, SessionError>;

    /// Mint a new access token from the refresh token. The refresh token
    /// itself is not rotated.
    async fn refresh(&self, refresh_token: &str) -> Result<String, SessionError>;

    /// Tell the server the session ended. Callers treat this as best-effort.
    async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), SessionError>;

    /// Fetch the identity of the token's subject.
    async fn fetch_identity(&self, access_token: &str) -> Result<IdentitySnapshot, SessionError>;
}

/// Servers either answer with the payload itself or wrap it under `data`.
pub fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") && !map.contains_key("access_token") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Pull the access token out of a refresh response.
pub fn extract_access_token(body: &Value) -> Option<String> {
    body.get("access_token")
        .or_else(|| body.pointer("/data/access_token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn access_token_found_top_level_or_nested() {
        assert_eq!(
            extract_access_token(&json!({"access_token": "a"})).as_deref(),
            Some("a")
        );
        assert_eq!(
            extract_access_token(&json!({"data": {"access_token": "b"}})).as_deref(),
            Some("b")
        );
        assert_eq!(extract_access_token(&json!({"access_token": ""})), None);
        assert_eq!(extract_access_token(&json!({"token": "c"})), None);
    }

    #[test]
    fn data_envelope_is_unwrapped() {
        assert_eq!(unwrap_data(json!({"data": {"id": 1}})), json!({"id": 1}));
        assert_eq!(unwrap_data(json!({"id": 1})), json!({"id": 1}));
    }
}
