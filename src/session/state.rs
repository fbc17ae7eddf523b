use serde::Serialize;

use crate::models::{CredentialPair, IdentitySnapshot};

/// Where the session sits in its lifecycle.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
    Refreshing,
    LoggedOut,
}

/// Observable session state. Every transition replaces it in one step.
///
/// `is_authenticated` implies `credentials.access_token` is set. The
/// converse does not hold while a refresh is in progress.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub is_authenticated: bool,
    pub is_initialized: bool,
    pub is_loading: bool,
    pub identity: Option<IdentitySnapshot>,
    #[serde(skip)]
    pub credentials: CredentialPair,
    /// Bumped on login and on every logout that ends something; late
    /// background results tagged with an older generation are dropped.
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl SessionState {
    pub fn access_token(&self) -> Option<&str> {
        self.credentials.access_token.as_deref()
    }

    /// Initialization finished and nothing is loading; guards may decide.
    pub fn is_settled(&self) -> bool {
        self.is_initialized && !self.is_loading
    }

    pub(crate) fn authenticate(&mut self, credentials: CredentialPair, identity: Option<IdentitySnapshot>) {
        self.credentials = credentials;
        self.identity = identity;
        self.is_authenticated = self.credentials.access_token.is_some();
        self.phase = if self.is_authenticated {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        };
    }

    /// Back to the unauthenticated shape. Returns whether anything was
    /// actually torn down, together with the credentials that were held.
    pub(crate) fn end(&mut self) -> (bool, CredentialPair) {
        let was_authenticated = self.is_authenticated;
        let credentials = std::mem::take(&mut self.credentials);
        let ended_something =
            was_authenticated || !credentials.is_empty() || self.identity.is_some();

        self.identity = None;
        self.is_authenticated = false;
        self.is_loading = false;
        self.phase = SessionPhase::LoggedOut;
        if ended_something {
            self.generation += 1;
        }
        (was_authenticated, credentials)
    }
}
