// Symmetric encryption of serializable values
//
// Design Decision: callers get opaque "encrypt failed"/"decrypt failed"
// errors while the underlying cause only reaches the debug log. Decrypt
// failures routinely mean stale or tampered data from a previous run, and
// the detail should not leak into user-facing messages.

use crate::error::{CoreError, Result};
use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes128Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Mutex;

/// Development fallback; production deployments call `set_key`
const DEFAULT_KEY: &[u8; 16] = b"1234567890abcdef";

/// AES-128-GCM encryption of JSON-serializable values
///
/// The wire form is `base64(nonce).base64(ciphertext)` with a fresh random
/// 12-byte nonce per encryption, so encrypting the same value twice yields
/// different envelopes.
pub struct CryptoService {
    key: Mutex<[u8; 16]>,
}

impl CryptoService {
    pub fn new() -> Self {
        Self {
            key: Mutex::new(*DEFAULT_KEY),
        }
    }

    /// Replaces the encryption key; must be exactly 16 bytes
    pub fn set_key(&self, key: &str) -> Result<()> {
        let bytes: [u8; 16] = key
            .as_bytes()
            .try_into()
            .map_err(|_| CoreError::Config("Encryption key must be 16 bytes".to_string()))?;
        *self.key.lock().unwrap() = bytes;
        Ok(())
    }

    fn cipher(&self) -> Aes128Gcm {
        let key = *self.key.lock().unwrap();
        Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&key))
    }

    /// Serializes and encrypts a value into the dotted envelope form
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encrypt`] on any failure; the cause is logged
    /// at debug level only.
    pub fn encrypt<T: Serialize>(&self, value: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(value).map_err(|e| {
            tracing::debug!("Encrypt failed during serialization: {}", e);
            CoreError::Encrypt
        })?;
        let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| {
                tracing::debug!("Encrypt failed: {}", e);
                CoreError::Encrypt
            })?;
        Ok(format!(
            "{}.{}",
            BASE64.encode(nonce),
            BASE64.encode(ciphertext)
        ))
    }

    /// Decrypts and deserializes a dotted envelope back into a value
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decrypt`] for malformed envelopes, wrong keys,
    /// tampered ciphertext, or non-deserializable plaintext.
    pub fn decrypt<T: DeserializeOwned>(&self, envelope: &str) -> Result<T> {
        let (nonce_b64, ct_b64) = envelope.split_once('.').ok_or_else(|| {
            tracing::debug!("Decrypt failed: malformed envelope");
            CoreError::Decrypt
        })?;
        let nonce_bytes = BASE64.decode(nonce_b64).map_err(|e| {
            tracing::debug!("Decrypt failed on nonce: {}", e);
            CoreError::Decrypt
        })?;
        let ciphertext = BASE64.decode(ct_b64).map_err(|e| {
            tracing::debug!("Decrypt failed on ciphertext: {}", e);
            CoreError::Decrypt
        })?;
        if nonce_bytes.len() != 12 {
            tracing::debug!("Decrypt failed: bad nonce length {}", nonce_bytes.len());
            return Err(CoreError::Decrypt);
        }
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| {
                tracing::debug!("Decrypt failed: {}", e);
                CoreError::Decrypt
            })?;
        serde_json::from_slice(&plaintext).map_err(|e| {
            tracing::debug!("Decrypt failed during deserialization: {}", e);
            CoreError::Decrypt
        })
    }
}

impl Default for CryptoService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        admin: bool,
    }

    #[test]
    fn test_roundtrip() {
        let crypto = CryptoService::new();
        let session = Session {
            user: "ada".to_string(),
            admin: true,
        };
        let envelope = crypto.encrypt(&session).unwrap();
        assert!(envelope.contains('.'));
        let back: Session = crypto.decrypt(&envelope).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let crypto = CryptoService::new();
        let a = crypto.encrypt(&"same").unwrap();
        let b = crypto.encrypt(&"same").unwrap();
        assert_ne!(a, b);
        assert_eq!(crypto.decrypt::<String>(&a).unwrap(), "same");
        assert_eq!(crypto.decrypt::<String>(&b).unwrap(), "same");
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let crypto = CryptoService::new();
        let envelope = crypto.encrypt(&"secret").unwrap();
        let (nonce, ct) = envelope.split_once('.').unwrap();
        let mut bytes = BASE64.decode(ct).unwrap();
        bytes[0] ^= 0xff;
        let tampered = format!("{}.{}", nonce, BASE64.encode(bytes));
        assert!(matches!(
            crypto.decrypt::<String>(&tampered),
            Err(CoreError::Decrypt)
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let crypto = CryptoService::new();
        let envelope = crypto.encrypt(&42_u32).unwrap();

        let other = CryptoService::new();
        other.set_key("fedcba0987654321").unwrap();
        assert!(matches!(
            other.decrypt::<u32>(&envelope),
            Err(CoreError::Decrypt)
        ));
    }

    #[test]
    fn test_malformed_envelope_rejected() {
        let crypto = CryptoService::new();
        for bad in ["", "no-dot", "!!!.###", "YWJj.YWJj"] {
            assert!(matches!(
                crypto.decrypt::<String>(bad),
                Err(CoreError::Decrypt)
            ));
        }
    }

    #[test]
    fn test_key_length_validated() {
        let crypto = CryptoService::new();
        assert!(crypto.set_key("short").is_err());
        assert!(crypto.set_key("exactly16bytes!!").is_ok());
    }
}
