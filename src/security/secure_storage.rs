// Encrypted-at-rest wrapper over namespaced storage

use crate::security::crypto::CryptoService;
use crate::storage::StorageService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Stores values encrypted, mirroring the plain storage API
///
/// Failures never surface: a value that cannot be encrypted is not stored,
/// and a value that cannot be decrypted (stale key, tampering, old format)
/// reads back as absent. Both cases leave a warning in the log.
pub struct SecureStorage {
    storage: Arc<StorageService>,
    crypto: Arc<CryptoService>,
}

impl SecureStorage {
    pub fn new(storage: Arc<StorageService>, crypto: Arc<CryptoService>) -> Self {
        Self { storage, crypto }
    }

    /// Encrypts and persists a value under the key
    pub fn set_item<T: Serialize>(&self, key: &str, value: &T) {
        match self.crypto.encrypt(value) {
            Ok(envelope) => self.storage.set(key, &envelope),
            Err(e) => tracing::warn!("Secure storage write for '{}' skipped: {}", key, e),
        }
    }

    /// Reads back and decrypts a value, or None
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let envelope: String = self.storage.get(key)?;
        match self.crypto.decrypt(&envelope) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Secure storage read for '{}' failed: {}", key, e);
                None
            }
        }
    }

    pub fn remove_item(&self, key: &str) {
        self.storage.remove(key);
    }

    pub fn clear(&self) {
        self.storage.clear();
    }
}
