/// API-key storage: simple CRUD over a key-value secret store.
///
/// The host embeds its own storage (a keychain, an extension secret vault);
/// the adapter only needs get/store/delete on string keys. No interactive
/// prompting happens here.
use rustc_hash::FxHashMap;

use crate::error::BridgeError;

/// The well-known secret key the API key is stored under.
pub const API_KEY_SECRET: &str = "api-key";

/// Key-value secret storage supplied by the host.
pub trait SecretStore {
    fn get(&self, key: &str) -> Option<String>;
    fn store(&mut self, key: &str, value: &str);
    fn delete(&mut self, key: &str);
}

/// In-memory store for tests and embedding hosts that manage persistence
/// themselves.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: FxHashMap<String, String>,
}

impl MemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn delete(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Reads the API key from a process environment variable. Writes are
/// no-ops; the environment is not a writable store.
#[derive(Debug)]
pub struct EnvSecretStore {
    variable: String,
}

impl EnvSecretStore {
    #[must_use]
    pub fn new(variable: &str) -> Self {
        Self {
            variable: variable.to_string(),
        }
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self, key: &str) -> Option<String> {
        if key != API_KEY_SECRET {
            return None;
        }
        std::env::var(&self.variable).ok().filter(|v| !v.is_empty())
    }

    fn store(&mut self, key: &str, _value: &str) {
        tracing::debug!(key, "ignoring store into environment-backed secret store");
    }

    fn delete(&mut self, key: &str) {
        tracing::debug!(key, "ignoring delete from environment-backed secret store");
    }
}

/// Fetch the API key from the store.
///
/// # Errors
///
/// Returns [`BridgeError::Auth`] when no non-empty key is stored.
pub fn ensure_api_key(store: &dyn SecretStore) -> Result<String, BridgeError> {
    store
        .get(API_KEY_SECRET)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| BridgeError::Auth("API key not found in secret storage".to_string()))
}
