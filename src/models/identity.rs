use serde::{Deserialize, Serialize};

/// Minimal projection of the authenticated subject.
///
/// The server is free to send more; anything not listed here is dropped.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default, alias = "displayName", alias = "name", alias = "full_name")]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Role-relevant position, used by the permission cache.
    #[serde(default, alias = "role")]
    pub position: Option<String>,
    #[serde(default, alias = "avatarUrl", alias = "avatar_url")]
    pub avatar: Option<String>,
}

/// Servers disagree on whether ids are numbers or strings.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl IdentitySnapshot {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        IdentitySnapshot {
            id: id.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_and_camel_case_aliases() {
        let identity: IdentitySnapshot = serde_json::from_str(
            r#"{"id": 42, "displayName": "Grace", "role": "manager", "avatarUrl": "a.png", "extra": true}"#,
        )
        .expect("identity should parse");
        assert_eq!(identity.id, "42");
        assert_eq!(identity.display_name, "Grace");
        assert_eq!(identity.position.as_deref(), Some("manager"));
        assert_eq!(identity.avatar.as_deref(), Some("a.png"));
        assert_eq!(identity.email, None);
    }
}
