use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::base::{extract_access_token, unwrap_data, AuthApi};
use crate::client::classify::{classify, Classification};
use crate::config::ApiConfig;
use crate::error::SessionError;
use crate::models::{IdentitySnapshot, LoginGrant};

/// [`AuthApi`] over HTTP, using the endpoint paths from [`ApiConfig`].
///
/// Requests made here bypass the interceptor pair on purpose: a 401 from the
/// refresh endpoint must never queue behind the refresh it belongs to.
pub struct HttpAuthApi {
    config: ApiConfig,
    client: Client,
}

impl HttpAuthApi {
    pub fn new(config: &ApiConfig) -> Result<Self, SessionError> {
        info!("Creating HTTP auth API for '{}'", config.base_url);
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()
            .map_err(|e| SessionError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    /// Read a JSON body, turning any non-2xx status into the matching error.
    async fn read_json(resp: Response) -> Result<Value, SessionError> {
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        match classify(status, &body) {
            Classification::Success => Ok(body),
            Classification::Unauthorized => Err(SessionError::AuthExpired),
            Classification::Validation(fields) => Err(SessionError::ValidationFailed(fields)),
            Classification::Application(message) => Err(SessionError::Application {
                status: Some(status),
                message,
            }),
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    fn get_name(&self) -> &str {
        &self.config.base_url
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, SessionError> {
        debug!("Logging in '{}' at '{}'", username, self.config.login_path);
        let resp = self
            .client
            .post(self.config.url(&self.config.login_path))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        let body = unwrap_data(Self::read_json(resp).await?);
        serde_json::from_value(body)
            .map_err(|e| SessionError::application(format!("Failed to parse login response: {}", e)))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, SessionError> {
        debug!("Exchanging refresh token at '{}'", self.config.refresh_path);
        let resp = self
            .client
            .post(self.config.url(&self.config.refresh_path))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let body = Self::read_json(resp).await?;
        extract_access_token(&body).ok_or_else(|| {
            SessionError::application("Failed to retrieve access token from refresh response")
        })
    }

    async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), SessionError> {
        debug!("Notifying server of logout at '{}'", self.config.logout_path);
        let mut request = self
            .client
            .post(self.config.url(&self.config.logout_path))
            .json(&json!({ "refresh_token": refresh_token }));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        Self::read_json(request.send().await?).await.map(|_| ())
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<IdentitySnapshot, SessionError> {
        debug!("Fetching identity from '{}'", self.config.identity_path);
        let resp = self
            .client
            .get(self.config.url(&self.config.identity_path))
            .bearer_auth(access_token)
            .send()
            .await?;
        let body = unwrap_data(Self::read_json(resp).await?);
        serde_json::from_value(body)
            .map_err(|e| SessionError::application(format!("Failed to parse identity: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    async fn api_for(server: &Server) -> HttpAuthApi {
        HttpAuthApi::new(&ApiConfig::with_base_url(server.url())).expect("client should build")
    }

    /// Test that refresh posts the refresh token and returns the new access token.
    #[tokio::test]
    async fn test_refresh_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/refresh")
            .match_body(Matcher::Json(json!({ "refresh_token": "r1" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "fresh"}"#)
            .create_async()
            .await;

        let api = api_for(&server).await;
        let result = api.refresh("r1").await;
        m.assert_async().await;
        assert_eq!(result, Ok("fresh".to_string()));
    }

    /// A refresh response without a token is an error, not an empty token.
    #[tokio::test]
    async fn test_refresh_without_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let api = api_for(&server).await;
        let result = api.refresh("r1").await;
        m.assert_async().await;
        assert!(matches!(result, Err(SessionError::Application { .. })));
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .with_body(r#"{"error": "refresh token revoked"}"#)
            .create_async()
            .await;

        let api = api_for(&server).await;
        let result = api.refresh("r1").await;
        m.assert_async().await;
        assert_eq!(result, Err(SessionError::AuthExpired));
    }

    #[tokio::test]
    async fn test_fetch_identity_sends_bearer() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/auth/me")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"id": 5, "display_name": "Lin", "email": "lin@example.com"}}"#)
            .create_async()
            .await;

        let api = api_for(&server).await;
        let identity = api.fetch_identity("tok").await.expect("identity");
        m.assert_async().await;
        assert_eq!(identity.id, "5");
        assert_eq!(identity.email.as_deref(), Some("lin@example.com"));
    }

    #[tokio::test]
    async fn test_login_parses_grant() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::PartialJson(json!({ "username": "ada" })))
            .with_status(200)
            .with_body(
                r#"{"access_token": "a", "refresh_token": "r", "user": {"id": "1", "display_name": "Ada"}}"#,
            )
            .create_async()
            .await;

        let api = api_for(&server).await;
        let grant = api.login("ada", "secret").await.expect("grant");
        m.assert_async().await;
        assert_eq!(grant.access_token, "a");
        assert_eq!(grant.user.display_name, "Ada");
    }

    #[tokio::test]
    async fn test_login_server_error_message() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/login")
            .with_status(500)
            .with_body(r#"{"message": "database unavailable"}"#)
            .create_async()
            .await;

        let api = api_for(&server).await;
        let err = api.login("ada", "secret").await.unwrap_err();
        m.assert_async().await;
        assert_eq!(
            err,
            SessionError::Application {
                status: Some(500),
                message: "database unavailable".to_string()
            }
        );
    }
}
