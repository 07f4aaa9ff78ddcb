// Namespaced key/value storage with persistent backend and in-memory fallback
//
// Design Decision: localStorage-shaped backend trait behind a namespacing service
//
// Rationale: Every higher service that needs durable client-side state (auth
// tokens, secure storage) talks to one minimal string-to-string interface:
// 1. The persistent backend is a single JSON map file, probed with a live
//    write/delete at construction; any failure falls back to a process-local
//    in-memory map so callers never observe storage absence
// 2. Keys are prefixed with a namespace derived from the configured
//    application name, preventing collisions across co-hosted applications
//    sharing one storage location
// 3. set swallows serialization/backend errors and get swallows parse errors,
//    because losing a cached preference must never crash the host application

use crate::config::AppConfigStore;
use crate::error::Result;
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Minimal persistent key/value interface (localStorage-compatible shape)
#[cfg_attr(test, automock)]
pub trait StorageBackend: Send + Sync {
    /// Stored string for the key, or None
    fn get_item(&self, key: &str) -> Option<String>;

    /// Stores a string under the key
    ///
    /// # Errors
    /// - Backend write failure (disk full, permissions)
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the key if present
    fn remove_item(&self, key: &str);

    /// Drops every stored entry
    fn clear(&self);
}

/// In-memory fallback backend
///
/// Used when the persistent store is absent or fails its sanity probe.
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.data.lock().unwrap().remove(key);
    }

    fn clear(&self) {
        self.data.lock().unwrap().clear();
    }
}

/// File-backed backend persisting the whole map as one JSON document
///
/// Reads the existing document at construction; every mutation rewrites the
/// file. Suitable for the small, low-churn state this crate stores.
pub struct FileStorage {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Opens (or initializes) the backing file
    ///
    /// # Errors
    /// - Parent directory creation failure
    /// - Existing file unreadable or not valid JSON
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Default location under the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("corekit")
            .join("storage.json")
    }

    fn persist(&self, data: &HashMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        self.persist(&data)
    }

    fn remove_item(&self, key: &str) {
        let mut data = self.data.lock().unwrap();
        data.remove(key);
        if let Err(e) = self.persist(&data) {
            tracing::warn!("storage remove not persisted: {}", e);
        }
    }

    fn clear(&self) {
        let mut data = self.data.lock().unwrap();
        data.clear();
        if let Err(e) = self.persist(&data) {
            tracing::warn!("storage clear not persisted: {}", e);
        }
    }
}

/// Namespaced storage service
///
/// All keys are stored as `<namespace>:<key>` where the namespace is the
/// configured application name, trimmed, lower-cased, with internal
/// whitespace runs collapsed to single hyphens.
///
/// Usage:
///     let storage = StorageService::new(cfg)?;
///     storage.set("auth-app", &token);
///     let token: Option<String> = storage.get("auth-app");
pub struct StorageService {
    backend: Arc<dyn StorageBackend>,
    ns: String,
}

impl StorageService {
    /// Resolves the backend: file-backed store if its sanity probe passes,
    /// otherwise an in-memory fallback
    ///
    /// # Errors
    /// - Configuration not loaded (the namespace needs the app name)
    pub fn new(cfg: Arc<AppConfigStore>) -> Result<Self> {
        let ns = normalize_ns(&cfg.config()?.app_name);
        Ok(Self {
            backend: detect_backend(FileStorage::default_path()),
            ns,
        })
    }

    /// Builds the service over an explicit backend (tests, custom stores)
    pub fn with_backend(cfg: Arc<AppConfigStore>, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let ns = normalize_ns(&cfg.config()?.app_name);
        Ok(Self { backend, ns })
    }

    /// Serializes and stores a value; errors are swallowed
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let full_key = self.key(key);
        match serde_json::to_string(value) {
            Ok(raw) => {
                if let Err(e) = self.backend.set_item(&full_key, &raw) {
                    tracing::warn!("storage set failed for {}: {}", full_key, e);
                }
            }
            Err(e) => tracing::warn!("storage serialization failed for {}: {}", full_key, e),
        }
    }

    /// Reads and deserializes a value; None on missing key or parse failure
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get_item(&self.key(key))?;
        serde_json::from_str(&raw).ok()
    }

    /// Removes a namespaced key
    pub fn remove(&self, key: &str) {
        self.backend.remove_item(&self.key(key));
    }

    /// Clears the whole backend
    pub fn clear(&self) {
        self.backend.clear();
    }

    /// Whether a parseable value exists under the key
    ///
    /// Defined as "get returns a value": an empty string stored under the key
    /// still counts as present.
    pub fn has(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).is_some()
    }

    fn key(&self, k: &str) -> String {
        format!("{}:{}", self.ns, k)
    }
}

fn normalize_ns(app_name: &str) -> String {
    WHITESPACE
        .replace_all(app_name.trim().to_lowercase().as_str(), "-")
        .into_owned()
}

fn detect_backend(path: PathBuf) -> Arc<dyn StorageBackend> {
    match FileStorage::open(path) {
        Ok(fs) => {
            // Live probe: a backend that cannot complete a write/delete
            // round trip is treated as absent.
            let probe_key = format!("__probe__{}", uuid::Uuid::new_v4());
            if fs.set_item(&probe_key, "1").is_ok() {
                fs.remove_item(&probe_key);
                Arc::new(fs)
            } else {
                Arc::new(MemoryStorage::new())
            }
        }
        Err(e) => {
            tracing::debug!("persistent storage unavailable, using memory: {}", e);
            Arc::new(MemoryStorage::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::CoreError;
    use tempfile::TempDir;

    fn cfg(app_name: &str) -> Arc<AppConfigStore> {
        Arc::new(AppConfigStore::with_config(AppConfig {
            app_name: app_name.to_string(),
            ..Default::default()
        }))
    }

    #[test]
    fn test_namespace_normalization() {
        assert_eq!(normalize_ns("  My App  "), "my-app");
        assert_eq!(normalize_ns("Billing   Portal UI"), "billing-portal-ui");
        assert_eq!(normalize_ns("plain"), "plain");
    }

    #[test]
    fn test_set_get_roundtrip_under_namespace() {
        let backend = Arc::new(MemoryStorage::new());
        let svc =
            StorageService::with_backend(cfg("  My App  "), backend.clone()).unwrap();

        svc.set("user", &serde_json::json!({"id": 9}));

        // Persisted under the namespaced key, not the bare key
        assert!(backend.get_item("my-app:user").is_some());
        assert!(backend.get_item("user").is_none());

        let value: Option<serde_json::Value> = svc.get("user");
        assert_eq!(value.unwrap()["id"], 9);
    }

    #[test]
    fn test_get_swallows_parse_errors() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set_item("demo:bad", "{not json").unwrap();
        let svc = StorageService::with_backend(cfg("demo"), backend).unwrap();

        let value: Option<serde_json::Value> = svc.get("bad");
        assert!(value.is_none());
        assert!(!svc.has("bad"));
    }

    #[test]
    fn test_has_counts_empty_string_as_present() {
        let backend = Arc::new(MemoryStorage::new());
        let svc = StorageService::with_backend(cfg("demo"), backend).unwrap();
        svc.set("token", &"");
        assert!(svc.has("token"));
    }

    #[test]
    fn test_remove_and_clear() {
        let backend = Arc::new(MemoryStorage::new());
        let svc = StorageService::with_backend(cfg("demo"), backend).unwrap();
        svc.set("a", &1);
        svc.set("b", &2);
        svc.remove("a");
        assert!(svc.get::<i32>("a").is_none());
        assert_eq!(svc.get::<i32>("b"), Some(2));
        svc.clear();
        assert!(svc.get::<i32>("b").is_none());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");

        {
            let fs = FileStorage::open(&path).unwrap();
            fs.set_item("demo:token", "\"abc\"").unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get_item("demo:token").unwrap(), "\"abc\"");
    }

    #[test]
    fn test_file_storage_set_failure_surfaces_underlying_error() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("inner");
        let path = inner.join("storage.json");
        let fs = FileStorage::open(&path).unwrap();
        std::fs::remove_dir_all(&inner).unwrap();

        let err = fs.set_item("k", "v").unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
        assert!(!err.to_string().contains("Storage error"));
    }

    #[test]
    fn test_detect_backend_falls_back_to_memory() {
        // A path whose parent cannot be created forces the fallback
        let backend = detect_backend(PathBuf::from("/dev/null/nope/storage.json"));
        backend.set_item("k", "v").unwrap();
        assert_eq!(backend.get_item("k").unwrap(), "v");
    }

    #[test]
    fn test_mock_backend_set_failure_is_swallowed() {
        let mut mock = MockStorageBackend::new();
        mock.expect_set_item()
            .returning(|_, _| Err(CoreError::Storage("disk full".to_string())));
        let svc = StorageService::with_backend(cfg("demo"), Arc::new(mock)).unwrap();

        // Must not panic or surface the error
        svc.set("k", &"v");
    }
}
