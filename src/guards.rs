//! Route-level gates on session state.
//!
//! A guard never decides while the session is initializing or loading; it
//! reports `Pending` until the state has settled.

use std::sync::Arc;

use tracing::debug;

use crate::collaborators::Navigator;
use crate::config::GuardConfig;
use crate::session::{Session, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Loading indicator; nothing decided yet.
    Pending,
    Redirect(String),
    Render,
}

/// `<login_path>?redirect=<requested>`, with the location percent-encoded.
pub fn login_redirect(login_path: &str, requested: &str) -> String {
    format!("{}?redirect={}", login_path, urlencoding::encode(requested))
}

fn follow(navigator: &dyn Navigator, outcome: &GuardOutcome) {
    if let GuardOutcome::Redirect(location) = outcome {
        navigator.redirect(location);
    }
}

/// Only authenticated sessions get through; others go to the login page.
pub struct RequireAuthenticated {
    config: GuardConfig,
    navigator: Arc<dyn Navigator>,
}

impl RequireAuthenticated {
    pub fn new(config: GuardConfig, navigator: Arc<dyn Navigator>) -> Self {
        RequireAuthenticated { config, navigator }
    }

    pub fn evaluate(&self, state: &SessionState, requested: &str) -> GuardOutcome {
        if !state.is_settled() {
            return GuardOutcome::Pending;
        }
        if state.is_authenticated {
            GuardOutcome::Render
        } else {
            GuardOutcome::Redirect(login_redirect(&self.config.login_path, requested))
        }
    }

    /// Decide from the current state, starting initialization if needed.
    pub fn mount(&self, session: &Arc<Session>, requested: &str) -> GuardOutcome {
        session.spawn_initialize();
        let outcome = self.evaluate(&session.snapshot(), requested);
        debug!(guard = "require_authenticated", ?outcome, requested);
        follow(self.navigator.as_ref(), &outcome);
        outcome
    }

    /// Wait for the session to settle, then decide.
    pub async fn settle(&self, session: &Arc<Session>, requested: &str) -> GuardOutcome {
        session.spawn_initialize();
        let state = session.settled().await;
        let outcome = self.evaluate(&state, requested);
        follow(self.navigator.as_ref(), &outcome);
        outcome
    }
}

/// Only guests get through; authenticated sessions go to the home page.
pub struct GuestOnly {
    config: GuardConfig,
    navigator: Arc<dyn Navigator>,
}

impl GuestOnly {
    pub fn new(config: GuardConfig, navigator: Arc<dyn Navigator>) -> Self {
        GuestOnly { config, navigator }
    }

    pub fn evaluate(&self, state: &SessionState) -> GuardOutcome {
        if !state.is_settled() {
            return GuardOutcome::Pending;
        }
        if state.is_authenticated {
            GuardOutcome::Redirect(self.config.home_path.clone())
        } else {
            GuardOutcome::Render
        }
    }

    pub fn mount(&self, session: &Arc<Session>) -> GuardOutcome {
        session.spawn_initialize();
        let outcome = self.evaluate(&session.snapshot());
        debug!(guard = "guest_only", ?outcome);
        follow(self.navigator.as_ref(), &outcome);
        outcome
    }

    pub async fn settle(&self, session: &Arc<Session>) -> GuardOutcome {
        session.spawn_initialize();
        let state = session.settled().await;
        let outcome = self.evaluate(&state);
        follow(self.navigator.as_ref(), &outcome);
        outcome
    }
}
