//! The session: credential lifecycle on top of the credential store.
//!
//! A `Session` is constructed explicitly and shared as `Arc<Session>` with
//! the HTTP client and the guards. All state lives in a `watch` channel so
//! every transition is a single replacement that observers see atomically.

use std::sync::Arc;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, warn};

use super::coordinator::{RefreshCoordinator, RefreshRole, RefreshTicket};
use super::state::{SessionPhase, SessionState};
use super::validity::is_locally_valid;
use crate::api::AuthApi;
use crate::collaborators::{NoPermissionCache, Notifier, PermissionCache, TracingNotifier};
use crate::error::SessionError;
use crate::models::{CredentialPair, IdentitySnapshot, LoginGrant, PersistedSession};
use crate::store::CredentialStore;

/// Shown once when a session ends because its credentials could not be repaired.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

pub struct Session {
    state: watch::Sender<SessionState>,
    store: CredentialStore,
    api: Arc<dyn AuthApi>,
    permissions: Arc<dyn PermissionCache>,
    notifier: Arc<dyn Notifier>,
    coordinator: RefreshCoordinator,
    init: OnceCell<()>,
}

impl Session {
    pub fn new(store: CredentialStore, api: Arc<dyn AuthApi>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Session {
            state,
            store,
            api,
            permissions: Arc::new(NoPermissionCache),
            notifier: Arc::new(TracingNotifier),
            coordinator: RefreshCoordinator::new(),
            init: OnceCell::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_permission_cache(mut self, permissions: Arc<dyn PermissionCache>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().credentials.access_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn identity(&self) -> Option<IdentitySnapshot> {
        self.state.borrow().identity.clone()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Wait until initialization has finished and nothing is loading.
    pub async fn settled(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(SessionState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        };
        settled
    }

    // -- Initialization

    /// Bootstrap the session from the credential store. Runs once per
    /// session; later and concurrent calls wait for that one run.
    pub async fn initialize(self: &Arc<Self>) {
        self.init.get_or_init(|| self.bootstrap()).await;
    }

    /// Start initialization in the background, for callers that cannot wait.
    pub fn spawn_initialize(self: &Arc<Self>) {
        match Handle::try_current() {
            Ok(handle) => {
                let session = Arc::clone(self);
                handle.spawn(async move { session.initialize().await });
            }
            Err(_) => debug!("No async runtime; initialization not started"),
        }
    }

    async fn bootstrap(self: &Arc<Self>) {
        info!("Initializing session");
        self.state.send_modify(|s| {
            s.phase = SessionPhase::Initializing;
            s.is_loading = true;
        });

        let stored = self.store.get();
        let (access_token, refresh_token) = match (stored.access_token, stored.refresh_token) {
            (Some(access), Some(refresh)) => (access, refresh),
            (access, refresh) => {
                if access.is_some() || refresh.is_some() {
                    warn!("Credential store held only one token; discarding it");
                    self.store.clear();
                }
                info!("No stored credentials; session is unauthenticated");
                self.finish_init();
                return;
            }
        };

        // the rehydrated identity may be stale; it is replaced below
        let cached_identity = self.store.load_record().and_then(|record| record.user);
        let credentials = CredentialPair::new(access_token.clone(), refresh_token);

        if is_locally_valid(&access_token, Utc::now().timestamp()) {
            self.state
                .send_modify(|s| s.authenticate(credentials, cached_identity));
            debug!("Stored access token passed local check; session is authenticated");
        } else {
            info!("Stored access token failed local check; attempting one refresh");
            self.state.send_modify(|s| {
                s.credentials = credentials;
                s.identity = cached_identity;
            });
            let ticket = self.refresh_shared(Some(&access_token), false).await;
            if let Err(e) = ticket.outcome {
                info!("Refresh during initialization failed: {}", e);
                self.finish_init();
                return;
            }
        }

        let generation = self.generation();
        match self.fetch_identity().await {
            Ok(identity) => {
                if self.apply_identity(generation, identity.clone()) {
                    self.spawn_permission_load(generation, identity);
                }
            }
            Err(e) if self.generation() == generation => {
                warn!("Identity fetch during initialization failed; logging out: {}", e);
                self.logout();
            }
            Err(e) => debug!("Ignoring identity failure for a replaced session: {}", e),
        }
        self.finish_init();
    }

    fn finish_init(&self) {
        self.state.send_modify(|s| {
            s.is_loading = false;
            s.is_initialized = true;
            if !s.is_authenticated {
                s.phase = SessionPhase::Unauthenticated;
            }
        });
        let state = self.state.borrow();
        info!(
            authenticated = state.is_authenticated,
            "Session initialized"
        );
    }

    // -- Login

    /// Adopt a login grant: tokens, identity and the authenticated flag
    /// change in one step. Identity and permission enrichment runs in the
    /// background and never blocks the transition.
    pub fn login(self: &Arc<Self>, grant: LoginGrant) {
        let credentials = grant.credentials();
        let identity = grant.user.clone();
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.authenticate(credentials, Some(identity));
            s.is_initialized = true;
            s.is_loading = false;
        });
        // a login settles the session; a later initialize() has nothing to do
        let _ = self.init.set(());

        self.store.set(&grant.access_token, &grant.refresh_token);
        self.persist_record();
        info!(user = %grant.user.id, "Session authenticated by login");

        self.spawn_enrichment(generation);
    }

    /// Call the login endpoint, then adopt the returned grant.
    pub async fn sign_in(
        self: &Arc<Self>,
        username: &str,
        password: &str,
    ) -> Result<IdentitySnapshot, SessionError> {
        let grant = self.api.login(username, password).await.map_err(|e| {
            warn!("Login for '{}' failed: {}", username, e);
            e
        })?;
        let identity = grant.user.clone();
        self.login(grant);
        Ok(identity)
    }

    // -- Refresh

    /// Mint a new access token, sharing any refresh already in flight.
    /// On failure the session has been logged out by the time this returns.
    pub async fn refresh_token(self: &Arc<Self>) -> Result<String, SessionError> {
        self.refresh_shared(None, true).await.outcome
    }

    /// Refresh on behalf of a request that was stamped with `stale` and
    /// came back unauthorized.
    pub async fn refresh_after_unauthorized(self: &Arc<Self>, stale: Option<&str>) -> RefreshTicket {
        self.refresh_shared(stale, true).await
    }

    async fn refresh_shared(self: &Arc<Self>, stale: Option<&str>, enrich: bool) -> RefreshTicket {
        let ticket = self
            .coordinator
            .run(stale, || self.access_token(), || self.perform_refresh())
            .await;
        if enrich && ticket.role == RefreshRole::Leader && ticket.outcome.is_ok() {
            self.spawn_enrichment(self.generation());
        }
        ticket
    }

    /// The refresh call itself. Only the coordinator's leader gets here.
    async fn perform_refresh(&self) -> Result<String, SessionError> {
        let (refresh_token, generation) = {
            let s = self.state.borrow();
            (s.credentials.refresh_token.clone(), s.generation)
        };
        let Some(refresh_token) = refresh_token else {
            warn!("No refresh token available; ending session");
            self.expire();
            return Err(SessionError::AuthInvalid(
                "no refresh token available".to_string(),
            ));
        };

        self.state.send_modify(|s| {
            s.phase = SessionPhase::Refreshing;
            s.is_loading = true;
        });
        let mut in_flight = RefreshInFlight {
            state: &self.state,
            armed: true,
        };
        let result = self.api.refresh(&refresh_token).await;
        in_flight.armed = false;

        match result {
            Ok(access_token) => {
                let mut applied = false;
                self.state.send_modify(|s| {
                    if s.generation == generation {
                        // the refresh token is deliberately left as is
                        s.credentials.access_token = Some(access_token.clone());
                        s.is_authenticated = true;
                        s.phase = SessionPhase::Authenticated;
                        applied = true;
                    }
                    s.is_loading = false;
                });
                if !applied {
                    info!("Session ended while refreshing; discarding new token");
                    return Err(SessionError::AuthInvalid(
                        "session ended during refresh".to_string(),
                    ));
                }
                self.store.set_access_token(&access_token);
                self.persist_record();
                info!("Access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                self.expire();
                Err(match e {
                    SessionError::AuthInvalid(_) => e,
                    other => SessionError::AuthInvalid(other.to_string()),
                })
            }
        }
    }

    // -- Logout

    /// Reset to the unauthenticated shape, clear the credential store and
    /// the permission cache, and tell the server in the background.
    ///
    /// Safe to call any number of times. Returns true only for the call
    /// that ended an authenticated session.
    pub fn logout(&self) -> bool {
        let (was_authenticated, held) = self.end_session();
        if !held.is_empty() {
            self.notify_server_of_logout(held);
        }
        was_authenticated
    }

    /// Like [`Session::logout`], but waits for the server notification
    /// instead of spawning it. Its failure is still only logged.
    pub async fn sign_out(&self) -> bool {
        let (was_authenticated, held) = self.end_session();
        if !held.is_empty() {
            Self::server_logout(self.api.as_ref(), held).await;
        }
        was_authenticated
    }

    fn end_session(&self) -> (bool, CredentialPair) {
        let mut ended = (false, CredentialPair::default());
        self.state.send_modify(|s| ended = s.end());

        self.store.clear();
        self.permissions.clear();

        if ended.0 {
            info!("Session logged out");
        } else {
            debug!("Logout on a session that was not authenticated");
        }
        ended
    }

    /// Log out because credentials could not be repaired, notifying the
    /// user once for the session that ended.
    pub(crate) fn expire(&self) -> bool {
        let ended = self.logout();
        if ended {
            self.notifier.error(SESSION_EXPIRED_MESSAGE);
        }
        ended
    }

    fn notify_server_of_logout(&self, credentials: CredentialPair) {
        let Ok(handle) = Handle::try_current() else {
            debug!("No async runtime; skipping server logout notification");
            return;
        };
        let api = Arc::clone(&self.api);
        handle.spawn(async move { Self::server_logout(api.as_ref(), credentials).await });
    }

    async fn server_logout(api: &dyn AuthApi, credentials: CredentialPair) {
        if let Err(e) = api
            .logout(
                credentials.access_token.as_deref(),
                credentials.refresh_token.as_deref(),
            )
            .await
        {
            warn!("Server logout notification failed (ignored): {}", e);
        }
    }

    // -- Identity

    /// Fetch the identity again on demand. Failure leaves the session
    /// authenticated with whatever identity it already had.
    pub async fn reload_user(&self) -> Result<IdentitySnapshot, SessionError> {
        let generation = self.generation();
        let identity = self.fetch_identity().await.map_err(|e| {
            warn!("Reloading identity failed: {}", e);
            e
        })?;
        if self.apply_identity(generation, identity.clone()) {
            self.load_permissions(generation, &identity).await;
        }
        Ok(identity)
    }

    async fn fetch_identity(&self) -> Result<IdentitySnapshot, SessionError> {
        let token = self
            .access_token()
            .ok_or_else(|| SessionError::AuthInvalid("not authenticated".to_string()))?;
        self.api.fetch_identity(&token).await
    }

    /// Store the identity unless the session changed hands since `generation`.
    fn apply_identity(&self, generation: u64, identity: IdentitySnapshot) -> bool {
        let mut applied = false;
        self.state.send_modify(|s| {
            if s.generation == generation && s.is_authenticated {
                s.identity = Some(identity);
                applied = true;
            }
        });
        if applied {
            self.persist_record();
        } else {
            debug!("Discarding identity fetched for an ended session");
        }
        applied
    }

    async fn load_permissions(&self, generation: u64, identity: &IdentitySnapshot) {
        if let Err(e) = self.permissions.load(identity).await {
            warn!("Loading permissions failed: {}", e);
        }
        // a logout that raced the load must not leave permissions behind
        if self.generation() != generation {
            self.permissions.clear();
        }
    }

    fn spawn_permission_load(self: &Arc<Self>, generation: u64, identity: IdentitySnapshot) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let session = Arc::clone(self);
        handle.spawn(async move { session.load_permissions(generation, &identity).await });
    }

    /// Best-effort identity and permission refresh after login or refresh.
    fn spawn_enrichment(self: &Arc<Self>, generation: u64) {
        let Ok(handle) = Handle::try_current() else {
            debug!("No async runtime; skipping identity enrichment");
            return;
        };
        let session = Arc::clone(self);
        handle.spawn(async move {
            match session.fetch_identity().await {
                Ok(identity) => {
                    if session.apply_identity(generation, identity.clone()) {
                        session.load_permissions(generation, &identity).await;
                    }
                }
                Err(e) => warn!("Identity enrichment failed (ignored): {}", e),
            }
        });
    }

    fn persist_record(&self) {
        let record = {
            let s = self.state.borrow();
            if s.credentials.access_token.is_none() {
                return;
            }
            PersistedSession::new(s.identity.clone(), &s.credentials, s.is_authenticated)
        };
        self.store.save_record(&record);
    }
}

/// Marks the session as refreshing. Dropped while still armed (the leader
/// was cancelled mid-call), it puts the loading flag and phase back.
struct RefreshInFlight<'a> {
    state: &'a watch::Sender<SessionState>,
    armed: bool,
}

impl Drop for RefreshInFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Token refresh cancelled; restoring session state");
        self.state.send_modify(|s| {
            s.is_loading = false;
            s.phase = if s.is_authenticated {
                SessionPhase::Authenticated
            } else {
                SessionPhase::Unauthenticated
            };
        });
    }
}
