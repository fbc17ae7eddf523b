use serde::{Deserialize, Serialize};

use super::identity::IdentitySnapshot;

/// The access/refresh token pair held by a session.
///
/// Both tokens are persisted together or not at all. The access token alone
/// is replaced when a refresh succeeds.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        CredentialPair {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Both tokens present.
    pub fn is_complete(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }

    /// Both tokens absent.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// What the login endpoint hands back on success.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, alias = "identity")]
    pub user: IdentitySnapshot,
}

impl LoginGrant {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_completeness() {
        assert!(CredentialPair::new("a", "r").is_complete());
        assert!(CredentialPair::default().is_empty());

        let half = CredentialPair {
            access_token: Some("a".to_string()),
            refresh_token: None,
        };
        assert!(!half.is_complete());
        assert!(!half.is_empty());
    }

    #[test]
    fn grant_accepts_identity_alias() {
        let grant: LoginGrant = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","identity":{"id":"7","display_name":"Ada"}}"#,
        )
        .expect("grant should parse");
        assert_eq!(grant.user.id, "7");
        assert_eq!(grant.credentials(), CredentialPair::new("a", "r"));
    }
}
