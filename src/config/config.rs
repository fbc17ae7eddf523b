use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::api::{ApiConfig, GuardConfig};
use super::logging::LoggingConfig;
use super::store::StoreConfig;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// Environment variables with this prefix override file values.
/// Nested keys are separated by a double underscore, e.g. `AUTHSESSION_API__BASE_URL`.
pub const ENV_PREFIX: &str = "AUTHSESSION_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: backend endpoints, credential storage, guards and logging.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Path substrings whose failures never reach the notification sink.
    #[serde(default)]
    pub silent_endpoints: Vec<String>,
    #[serde(default)]
    pub guards: GuardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigV1 {
    /// Minimal config for a backend at `base_url`, everything else defaulted.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        ConfigV1 {
            api: ApiConfig::with_base_url(base_url),
            store: StoreConfig::default(),
            silent_endpoints: Vec::new(),
            guards: GuardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn extract(figment: Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
    // handle configuration migration between versions here when necessary
}

/// Load config from a YAML file, with `AUTHSESSION_*` environment overrides.
pub fn load_config_from(path: &str) -> Result<ConfigV1, figment::Error> {
    extract(
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__")),
    )
}

/// Parse config from an in-memory YAML document. Environment is not consulted.
pub fn load_config_str(yaml: &str) -> Result<ConfigV1, figment::Error> {
    extract(Figment::new().merge(Yaml::string(yaml)))
}

/// Load config from "config.yaml" in the current directory, exiting on error.
pub fn load_config() -> ConfigV1 {
    match load_config_from(DEFAULT_CONFIG_PATH) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStoreConfig;

    const TEST_CONFIG: &str = r#"
version: "1.0.0"
logging:
  level: "debug"
  format: "json"
api:
  base_url: http://localhost:9000
  timeout_in_ms: 2500
  refresh_path: /api/token/refresh
store:
  type: file
  path: /tmp/session.json
silent_endpoints:
  - /health
  - /notifications/unread
guards:
  login_path: /signin
"#;

    #[test]
    fn parses_full_config() {
        let config = load_config_str(TEST_CONFIG).expect("config should parse");
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.timeout_in_ms, 2500);
        assert_eq!(config.api.refresh_path, "/api/token/refresh");
        // untouched endpoints fall back to their defaults
        assert_eq!(config.api.logout_path, "/auth/logout");
        assert_eq!(
            config.store,
            StoreConfig::File(FileStoreConfig {
                path: "/tmp/session.json".to_string()
            })
        );
        assert_eq!(config.silent_endpoints.len(), 2);
        assert_eq!(config.guards.login_path, "/signin");
        assert_eq!(config.guards.home_path, "/");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let yaml = r#"
version: "1.0.0"
api:
  base_url: http://localhost:9000
"#;
        let config = load_config_str(yaml).expect("config should parse");
        assert_eq!(config.store, StoreConfig::Memory);
        assert!(config.silent_endpoints.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn unknown_version_is_rejected() {
        let yaml = r#"
version: "2.0.0"
api:
  base_url: http://localhost:9000
"#;
        assert!(load_config_str(yaml).is_err());
    }
}
