// Application configuration store
//
// Design Decision: Load-once immutable snapshot
//
// Rationale: Every cross-cutting service (interceptors, trace pipeline,
// reporters, storage) reads configuration synchronously on the hot path.
// Loading the JSON document exactly once at startup and freezing it gives:
// 1. Lock-free reads after load (OnceLock, plain shared references)
// 2. A single, loud failure mode for "read before load"
// 3. No torn configuration mid-flight (reload is not supported)
//
// Extension Points: Alternate sources (file, env) can construct the snapshot
// directly via `with_config` without going through the network fetch.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Default path for the configuration document, resolved against the host
pub const DEFAULT_CONFIG_URL: &str = "/config/app.config.json";

/// Retry policy section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetriesConfig {
    pub retries_http_request: bool,
    pub max_retries: i64,
    /// Delay between attempts in milliseconds
    pub max_interval: i64,
    /// URL substrings excluded from retrying
    pub exceptions_http: Vec<String>,
}

/// Outgoing HTTP section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub add_token_jwt: bool,
    /// URL substrings excluded from token injection
    pub exclude_token_jwt: Vec<String>,
    pub retries: RetriesConfig,
}

/// Response cache section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub cache: bool,
    /// Entry lifetime in milliseconds, checked lazily at read time
    pub max_age: i64,
    /// Allow-list of URL substrings; empty means nothing is cacheable
    pub cacheable_urls: Vec<String>,
}

/// Trace/audit section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceConfig {
    pub audit: bool,
    pub audit_host: String,
    /// Buffer flush interval in milliseconds (clamped to >= 1000)
    pub interval_send: Option<i64>,
}

/// Logger section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    pub loggers: bool,
    pub loggers_host: String,
}

/// Error reporting section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorsConfig {
    pub http_errors: bool,
    pub http_errors_host: String,
    pub js_errors: bool,
    pub js_errors_host: String,
}

/// Named API module the generic REST resource resolves its base URL from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiModule {
    pub name: String,
    pub base_url: String,
    pub path: String,
}

/// Application configuration snapshot
///
/// All sections default so a minimal document still parses; gates read as
/// disabled when their section is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub app_name: String,
    pub http: HttpConfig,
    pub global_loading: bool,
    pub cache: CacheConfig,
    pub trace: TraceConfig,
    pub logger: LoggerConfig,
    pub errors: ErrorsConfig,
    pub api_modules: Vec<ApiModule>,
    pub feature_flags: Option<HashMap<String, bool>>,
}

/// Store for application configuration
///
/// Manages loading and accessing the configuration document. Exactly one
/// load per process lifetime; reads before load fail with
/// `CoreError::ConfigNotLoaded`.
///
/// Usage:
///     let store = Arc::new(AppConfigStore::new());
///     store.load("https://host/config/app.config.json").await?;
///     let cfg = store.config()?;
pub struct AppConfigStore {
    snapshot: OnceLock<AppConfig>,
}

impl AppConfigStore {
    pub fn new() -> Self {
        Self {
            snapshot: OnceLock::new(),
        }
    }

    /// Create a store with a pre-built snapshot (tests, non-network sources)
    pub fn with_config(config: AppConfig) -> Self {
        let snapshot = OnceLock::new();
        let _ = snapshot.set(config);
        Self { snapshot }
    }

    /// Loads the configuration document from a URL
    ///
    /// Fetches with no-store cache semantics. On a non-success status the
    /// error embeds the status code and the response body text (empty string
    /// if the body read itself fails); network failures propagate unchanged.
    ///
    /// # Errors
    /// - Network failure during the fetch
    /// - Non-2xx response status
    /// - JSON parse failure
    /// - A snapshot is already loaded (reload is not supported)
    pub async fn load(&self, url: &str) -> Result<()> {
        let client = reqwest::Client::new();
        let res = client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Config(format!(
                "Config {}: {}",
                status.as_u16(),
                body
            )));
        }

        let config = res.json::<AppConfig>().await?;
        self.snapshot
            .set(config)
            .map_err(|_| CoreError::Config("AppConfig already loaded".to_string()))
    }

    /// Returns the snapshot
    ///
    /// # Errors
    /// - `ConfigNotLoaded` if called before a successful `load`
    pub fn config(&self) -> Result<&AppConfig> {
        self.snapshot.get().ok_or(CoreError::ConfigNotLoaded)
    }

    /// Whether a snapshot exists
    pub fn ready(&self) -> bool {
        self.snapshot.get().is_some()
    }
}

impl Default for AppConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
