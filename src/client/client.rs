use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::interceptor::{inspect, parse_body, stamp, transport_failure, Inbound, SilentList};
use crate::config::ApiConfig;
use crate::error::SessionError;
use crate::session::{RefreshRole, Session};

/// A request against the backend, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Set once the request has been through token recovery.
    pub retried: bool,
    pub id: Uuid,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
            id: Uuid::new_v4(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, SessionError> {
        let value = serde_json::to_value(body)
            .map_err(|e| SessionError::application(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// A 2xx response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// HTTP client that carries the session's credentials and repairs them
/// when the server rejects them.
pub struct AuthClient {
    config: ApiConfig,
    client: Client,
    session: Arc<Session>,
    silent: SilentList,
}

impl AuthClient {
    pub fn new(
        config: &ApiConfig,
        session: Arc<Session>,
        silent: SilentList,
    ) -> Result<Self, SessionError> {
        info!("Creating API client for '{}'", config.base_url);
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()
            .map_err(|e| SessionError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(AuthClient {
            config: config.clone(),
            client,
            session,
            silent,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, SessionError> {
        self.send(ApiRequest::get(path)).await
    }

    /// Send a request through the interceptor pair. A 401 is recovered at
    /// most once per request; a second 401 ends the session.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let span = info_span!(
            "request",
            request_id = %request.id,
            method = %request.method,
            path = %request.path
        );
        self.send_inner(request).instrument(span).await
    }

    async fn send_inner(&self, mut request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let notifier = self.session.notifier().as_ref();
        let mut replay_token: Option<String> = None;

        loop {
            let token = replay_token.take().or_else(|| self.session.access_token());
            let mut builder = self
                .client
                .request(request.method.clone(), self.config.url(&request.path));
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
            builder = stamp(builder, token.as_deref());

            let resp = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => return Err(transport_failure(e, &request.path, &self.silent, notifier)),
            };
            let status = resp.status().as_u16();
            let text = match resp.text().await {
                Ok(text) => text,
                Err(e) => return Err(transport_failure(e, &request.path, &self.silent, notifier)),
            };

            match inspect(status, parse_body(&text), &request.path, &self.silent, notifier) {
                Inbound::Pass(body) => return Ok(ApiResponse { status, body }),
                Inbound::Fail(e) => return Err(e),
                Inbound::Recover if request.retried => {
                    warn!("Request still unauthorized after token refresh; ending session");
                    self.session.expire();
                    return Err(SessionError::AuthInvalid(
                        "request unauthorized after token refresh".to_string(),
                    ));
                }
                Inbound::Recover => {
                    request.retried = true;
                    let ticket = self
                        .session
                        .refresh_after_unauthorized(token.as_deref())
                        .await;
                    match ticket.outcome {
                        Ok(fresh) => {
                            debug!(role = ?ticket.role, "Replaying request with refreshed token");
                            replay_token = Some(fresh);
                        }
                        Err(e) => {
                            if ticket.role != RefreshRole::Leader {
                                debug!("Shared token refresh failed: {}", e);
                            }
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}
