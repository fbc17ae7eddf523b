//! The combined `auth-storage` record kept next to the raw token entries.
//!
//! The record is tagged with a schema version so that a shape change can be
//! migrated here instead of being silently misread on rehydration.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::credentials::CredentialPair;
use super::identity::IdentitySnapshot;

/// Versioned envelope for the persisted session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "version")]
pub enum PersistedSession {
    #[serde(rename = "1")]
    V1(PersistedSessionV1),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSessionV1 {
    pub user: Option<IdentitySnapshot>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(rename = "isAuthenticated", alias = "is_authenticated")]
    pub is_authenticated: bool,
}

impl PersistedSession {
    pub fn new(
        user: Option<IdentitySnapshot>,
        credentials: &CredentialPair,
        is_authenticated: bool,
    ) -> Self {
        PersistedSession::V1(PersistedSessionV1 {
            user,
            access_token: credentials.access_token.clone(),
            refresh_token: credentials.refresh_token.clone(),
            is_authenticated,
        })
    }

    /// Decode a stored record, upgrading older versions to the current shape.
    /// Anything unreadable is discarded.
    pub fn decode(raw: &str) -> Option<PersistedSessionV1> {
        match serde_json::from_str::<PersistedSession>(raw) {
            Ok(PersistedSession::V1(v1)) => Some(v1),
            Err(e) => {
                warn!("Discarding unreadable auth-storage record: {}", e);
                None
            }
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
