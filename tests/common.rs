#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use authsession::api::AuthApi;
use authsession::collaborators::{Navigator, Notifier, PermissionCache};
use authsession::error::SessionError;
use authsession::models::{IdentitySnapshot, LoginGrant};
use authsession::session::Session;
use authsession::store::CredentialStore;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// A signed JWT whose `exp` is `offset_secs` from now.
pub fn mint_jwt(sub: &str, offset_secs: i64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: Utc::now().timestamp() + offset_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("JWT should encode")
}

pub fn identity(id: &str) -> IdentitySnapshot {
    IdentitySnapshot::new(id, format!("User {}", id))
}

pub fn grant(access: &str, refresh: &str) -> LoginGrant {
    LoginGrant {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        user: identity("1"),
    }
}

/// Poll `cond` until it holds, failing the test after about two seconds.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// In-process [`AuthApi`] with call counters and scripted results.
#[derive(Default)]
pub struct FakeApi {
    pub refresh_calls: AtomicUsize,
    pub identity_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    refresh_results: Mutex<VecDeque<Result<String, SessionError>>>,
    identity_results: Mutex<VecDeque<Result<IdentitySnapshot, SessionError>>>,
    /// When set, identity fetches wait for a permit before answering.
    pub identity_gate: Option<Arc<Notify>>,
    /// When set, refreshes wait for a permit before answering.
    pub refresh_gate: Option<Arc<Notify>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity_gate(mut self, gate: Arc<Notify>) -> Self {
        self.identity_gate = Some(gate);
        self
    }

    pub fn with_refresh_gate(mut self, gate: Arc<Notify>) -> Self {
        self.refresh_gate = Some(gate);
        self
    }

    pub fn push_refresh(&self, result: Result<String, SessionError>) {
        self.refresh_results.lock().unwrap().push_back(result);
    }

    pub fn push_identity(&self, result: Result<IdentitySnapshot, SessionError>) {
        self.identity_results.lock().unwrap().push_back(result);
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn identity_fetches(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    fn get_name(&self) -> &str {
        "fake"
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, SessionError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if password == "wrong" {
            return Err(SessionError::Application {
                status: Some(403),
                message: "Invalid credentials".to_string(),
            });
        }
        Ok(LoginGrant {
            access_token: format!("access-{}", username),
            refresh_token: format!("refresh-{}", username),
            user: IdentitySnapshot::new(username, username),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<String, SessionError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.refresh_gate {
            gate.notified().await;
        }
        self.refresh_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("refreshed".to_string()))
    }

    async fn logout(
        &self,
        _access_token: Option<&str>,
        _refresh_token: Option<&str>,
    ) -> Result<(), SessionError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Err(SessionError::application("logout endpoint unavailable"))
    }

    async fn fetch_identity(&self, _access_token: &str) -> Result<IdentitySnapshot, SessionError> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.identity_gate {
            gate.notified().await;
        }
        self.identity_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(identity("server")))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    locations: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn locations(&self) -> Vec<String> {
        self.locations.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, location: &str) {
        self.locations.lock().unwrap().push(location.to_string());
    }
}

#[derive(Default)]
pub struct RecordingPermissionCache {
    pub loaded: Mutex<Vec<String>>,
    pub clears: AtomicUsize,
}

impl RecordingPermissionCache {
    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionCache for RecordingPermissionCache {
    async fn load(&self, identity: &IdentitySnapshot) -> Result<(), String> {
        self.loaded.lock().unwrap().push(identity.id.clone());
        Ok(())
    }

    fn clear(&self) {
        self.loaded.lock().unwrap().clear();
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// A session with every collaborator recorded.
pub struct Harness {
    pub session: Arc<Session>,
    pub store: CredentialStore,
    pub api: Arc<FakeApi>,
    pub notifier: Arc<RecordingNotifier>,
    pub permissions: Arc<RecordingPermissionCache>,
}

impl Harness {
    pub fn new(api: FakeApi) -> Self {
        Self::with_store(api, CredentialStore::in_memory())
    }

    pub fn with_store(api: FakeApi, store: CredentialStore) -> Self {
        let api = Arc::new(api);
        let notifier = Arc::new(RecordingNotifier::default());
        let permissions = Arc::new(RecordingPermissionCache::default());
        let session = Arc::new(
            Session::new(store.clone(), api.clone())
                .with_notifier(notifier.clone())
                .with_permission_cache(permissions.clone()),
        );
        Harness {
            session,
            store,
            api,
            notifier,
            permissions,
        }
    }
}
