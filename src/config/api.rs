use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Location of the backend and of the four auth endpoints the session talks to.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_identity_path")]
    pub identity_path: String,
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

fn default_identity_path() -> String {
    "/auth/me".to_string()
}

impl ApiConfig {
    /// An API config pointing at `base_url` with every endpoint at its default path.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        ApiConfig {
            base_url: base_url.into(),
            timeout_in_ms: default_timeout_in_ms(),
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            identity_path: default_identity_path(),
        }
    }

    /// Joins `path` onto the base URL without doubling the slash.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Redirect targets used by the session guards.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq, Eq)]
pub struct GuardConfig {
    #[serde(default = "default_guard_login_path")]
    pub login_path: String,
    #[serde(default = "default_home_path")]
    pub home_path: String,
}

fn default_guard_login_path() -> String {
    "/login".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            login_path: default_guard_login_path(),
            home_path: default_home_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let config = ApiConfig::with_base_url("http://localhost:8080/");
        assert_eq!(
            config.url("/auth/refresh"),
            "http://localhost:8080/auth/refresh"
        );
        assert_eq!(config.url("users"), "http://localhost:8080/users");
    }
}
