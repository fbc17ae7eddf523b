//! Shared application state.
//!
//! Everything a command needs: the configuration, the session, the client
//! that carries the session's credentials, and the route guards.

use crate::client::AuthClient;
use crate::config::ConfigV1;
use crate::guards::{GuestOnly, RequireAuthenticated};
use crate::session::Session;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// The one session for this process.
    pub session: Arc<Session>,
    /// HTTP client bound to `session`.
    pub client: Arc<AuthClient>,
    /// Route guards built from `config.guards`.
    pub require_authenticated: Arc<RequireAuthenticated>,
    pub guest_only: Arc<GuestOnly>,
}
