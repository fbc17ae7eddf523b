use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the credential store keeps its key/value entries.
/// Backends are told apart by a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// Entries live for the lifetime of the process only.
    #[serde(rename = "memory")]
    Memory,
    /// Entries are kept in a JSON object file and survive restarts.
    #[serde(rename = "file")]
    File(FileStoreConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq, Eq)]
pub struct FileStoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}
