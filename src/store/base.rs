use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{file_store::FileStorage, memory_store::MemoryStorage};
use crate::config::StoreConfig;
use crate::models::{CredentialPair, PersistedSession, PersistedSessionV1};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const SESSION_RECORD_KEY: &str = "auth-storage";

/// The Storage trait abstracts a durable string key/value map.
///
/// Calls are synchronous: storage is local and the session treats every
/// write as fire-and-forget.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&self, key: &str) -> Result<(), String>;
    /// Backends that can drop several keys at once should override this.
    fn remove_many(&self, keys: &[&str]) -> Result<(), String> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
    fn name(&self) -> &str;
}

/// Creates a concrete storage backend based on the StoreConfig.
pub fn create_storage(config: &StoreConfig) -> Arc<dyn Storage> {
    match config {
        StoreConfig::Memory => {
            info!("Credential store is in-memory only.");
            Arc::new(MemoryStorage::new())
        }
        StoreConfig::File(file) => {
            info!("Credential store is backed by '{}'.", file.path);
            Arc::new(FileStorage::new(&file.path))
        }
    }
}

/// Creates the credential store described by the config.
pub fn create_store(config: &StoreConfig) -> CredentialStore {
    CredentialStore::new(create_storage(config))
}

/// Token pair and session record on top of a [`Storage`] backend.
///
/// Storage failures are logged and swallowed: the session keeps the
/// authoritative in-memory copy for the lifetime of the process.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        CredentialStore { storage }
    }

    pub fn in_memory() -> Self {
        CredentialStore::new(Arc::new(MemoryStorage::new()))
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Persist both tokens.
    pub fn set(&self, access_token: &str, refresh_token: &str) {
        debug!("Persisting credential pair to '{}' store", self.storage.name());
        self.write(ACCESS_TOKEN_KEY, access_token);
        self.write(REFRESH_TOKEN_KEY, refresh_token);
    }

    /// Replace only the access token, leaving the refresh token as stored.
    pub fn set_access_token(&self, access_token: &str) {
        self.write(ACCESS_TOKEN_KEY, access_token);
    }

    pub fn get(&self) -> CredentialPair {
        CredentialPair {
            access_token: self.read(ACCESS_TOKEN_KEY),
            refresh_token: self.read(REFRESH_TOKEN_KEY),
        }
    }

    /// Drop both tokens and the session record.
    pub fn clear(&self) {
        debug!("Clearing credentials from '{}' store", self.storage.name());
        if let Err(e) = self.storage.remove_many(&[
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            SESSION_RECORD_KEY,
        ]) {
            warn!("Failed to clear credential store: {}", e);
        }
    }

    pub fn save_record(&self, record: &PersistedSession) {
        match record.encode() {
            Ok(raw) => self.write(SESSION_RECORD_KEY, &raw),
            Err(e) => warn!("Failed to encode session record: {}", e),
        }
    }

    pub fn load_record(&self) -> Option<PersistedSessionV1> {
        self.read(SESSION_RECORD_KEY)
            .and_then(|raw| PersistedSession::decode(&raw))
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read '{}' from credential store: {}", key, e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            warn!("Failed to write '{}' to credential store: {}", key, e);
        }
    }
}
