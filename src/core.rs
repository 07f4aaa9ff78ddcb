// Assembly of the full cross-cutting pipeline and its services
//
// Design Decision: explicit construction over ambient globals
//
// Rationale: every service receives its collaborators through the builder,
// so there is exactly one place that knows the interceptor order and one
// handle (`Core`) owning the result. Tests assemble the same stack with a
// scripted transport; nothing resolves through process-wide state.
//
// The interceptor order is fixed and load-bearing:
// 1. cache     - serve hits before anything else spends work
// 2. loading   - count only requests that actually go out
// 3. auth      - token attached before telemetry sees the request
// 4. trace     - spans cover the retried call, headers propagate
// 5. logger    - request/response lines around the real exchange
// 6. error     - observe failures after logging, before retry gives up
// 7. retry     - innermost, so each attempt re-traverses nothing above

use crate::auth::{AuthTokenService, JwtInterceptor};
use crate::cache::{CacheInterceptor, CacheService};
use crate::config::{AppConfig, AppConfigStore, DEFAULT_CONFIG_URL};
use crate::error::Result;
use crate::events::EventBus;
use crate::flags::FeatureFlags;
use crate::http::client::CoreClient;
use crate::http::{Handler, Interceptor, ReqwestTransport};
use crate::loading::{GlobalLoadingService, LoadingInterceptor};
use crate::logger::{Logger, LoggerInterceptor, LoggerReporter};
use crate::report::{ErrorReporter, HttpErrorInterceptor, JsErrorHandler};
use crate::rest::Resource;
use crate::retry::RetryInterceptor;
use crate::security::{CryptoService, SecureStorage};
use crate::storage::{StorageBackend, StorageService};
use crate::trace::{AutoTracker, TraceBuffer, TraceInterceptor, TraceManager, TraceReporter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Builder for [`Core`]
///
/// Usage:
/// ```ignore
/// let core = Core::builder()
///     .config_url("https://host/config/app.config.json")
///     .build()
///     .await?;
/// let users: Vec<User> = core.resource("users").list(&[]).await?;
/// ```
pub struct CoreBuilder {
    config_url: String,
    config: Option<AppConfig>,
    transport: Option<Arc<dyn Handler>>,
    storage: Option<Arc<dyn StorageBackend>>,
    encryption_key: Option<String>,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Self {
            config_url: DEFAULT_CONFIG_URL.to_string(),
            config: None,
            transport: None,
            storage: None,
            encryption_key: None,
        }
    }

    /// Where to fetch the application config from
    pub fn config_url(mut self, url: impl Into<String>) -> Self {
        self.config_url = url.into();
        self
    }

    /// Uses an already-built config instead of fetching one
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the terminal transport; tests script this
    pub fn transport(mut self, transport: Arc<dyn Handler>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the storage backend; without this the platform data
    /// directory is used. Tests inject a memory store.
    pub fn storage(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(backend);
        self
    }

    /// Key for the secure storage cipher, 16 bytes
    pub fn encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    /// Loads the config and assembles the whole stack
    ///
    /// # Errors
    ///
    /// Fails when the config cannot be fetched or parsed, the encryption
    /// key is invalid, or storage cannot determine a namespace.
    pub async fn build(self) -> Result<Core> {
        let cfg = match self.config {
            Some(config) => Arc::new(AppConfigStore::with_config(config)),
            None => {
                let store = AppConfigStore::new();
                store.load(&self.config_url).await?;
                Arc::new(store)
            }
        };

        let transport: Arc<dyn Handler> = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));

        let crypto = Arc::new(CryptoService::new());
        if let Some(key) = &self.encryption_key {
            crypto.set_key(key)?;
        }

        let storage = Arc::new(match self.storage {
            Some(backend) => StorageService::with_backend(cfg.clone(), backend)?,
            None => StorageService::new(cfg.clone())?,
        });
        let secure_storage = Arc::new(SecureStorage::new(storage.clone(), crypto.clone()));
        let tokens = Arc::new(AuthTokenService::new(storage.clone()));
        let cache = Arc::new(CacheService::new(cfg.clone()));
        let loading = Arc::new(GlobalLoadingService::new());
        let flags = Arc::new(FeatureFlags::new(cfg.clone()));
        let bus = Arc::new(EventBus::new());

        let trace_reporter = Arc::new(TraceReporter::new(cfg.clone(), transport.clone()));
        let trace_buffer = TraceBuffer::new(cfg.clone(), trace_reporter);
        let trace = Arc::new(TraceManager::new(cfg.clone(), trace_buffer.clone()));
        let tracker = Arc::new(AutoTracker::new(
            cfg.clone(),
            trace.clone(),
            trace_buffer.clone(),
        ));
        tracker.start(Some(&bus));

        let log_reporter = Arc::new(LoggerReporter::new(cfg.clone(), transport.clone()));
        let logger = Arc::new(Logger::new(log_reporter.clone()));
        let errors = Arc::new(ErrorReporter::new(cfg.clone(), transport.clone()));
        let js_errors = Arc::new(JsErrorHandler::new(
            cfg.clone(),
            errors.clone(),
            trace.clone(),
        ));

        let interceptors: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(CacheInterceptor::new(cfg.clone(), cache.clone())),
            Arc::new(LoadingInterceptor::new(cfg.clone(), loading.clone())),
            Arc::new(JwtInterceptor::new(cfg.clone(), tokens.clone())),
            Arc::new(TraceInterceptor::new(cfg.clone(), trace.clone())),
            Arc::new(LoggerInterceptor::new(cfg.clone(), log_reporter)),
            Arc::new(HttpErrorInterceptor::new(
                cfg.clone(),
                errors.clone(),
                trace.clone(),
            )),
            Arc::new(RetryInterceptor::new(cfg.clone())),
        ];
        let client = CoreClient::new(interceptors, transport);

        Ok(Core {
            cfg,
            client,
            cache,
            loading,
            tokens,
            storage,
            secure_storage,
            crypto,
            flags,
            logger,
            errors,
            js_errors,
            trace,
            trace_buffer,
            tracker,
            bus,
        })
    }
}

impl Default for CoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled pipeline and every service hanging off it
pub struct Core {
    cfg: Arc<AppConfigStore>,
    client: CoreClient,
    cache: Arc<CacheService>,
    loading: Arc<GlobalLoadingService>,
    tokens: Arc<AuthTokenService>,
    storage: Arc<StorageService>,
    secure_storage: Arc<SecureStorage>,
    crypto: Arc<CryptoService>,
    flags: Arc<FeatureFlags>,
    logger: Arc<Logger>,
    errors: Arc<ErrorReporter>,
    js_errors: Arc<JsErrorHandler>,
    trace: Arc<TraceManager>,
    trace_buffer: Arc<TraceBuffer>,
    tracker: Arc<AutoTracker>,
    bus: Arc<EventBus>,
}

impl Core {
    pub fn builder() -> CoreBuilder {
        CoreBuilder::new()
    }

    pub fn config(&self) -> &AppConfigStore {
        &self.cfg
    }

    /// The interceptor-backed HTTP client
    pub fn client(&self) -> &CoreClient {
        &self.client
    }

    /// Typed CRUD client for one configured API module
    pub fn resource<T>(&self, module: impl Into<String>) -> Resource<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        Resource::new(self.client.clone(), self.cfg.clone(), module)
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    pub fn loading(&self) -> &GlobalLoadingService {
        &self.loading
    }

    pub fn tokens(&self) -> &AuthTokenService {
        &self.tokens
    }

    pub fn storage(&self) -> &StorageService {
        &self.storage
    }

    pub fn secure_storage(&self) -> &SecureStorage {
        &self.secure_storage
    }

    pub fn crypto(&self) -> &CryptoService {
        &self.crypto
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn errors(&self) -> &ErrorReporter {
        &self.errors
    }

    /// Handler for application errors raised outside the HTTP pipeline
    pub fn error_handler(&self) -> &JsErrorHandler {
        &self.js_errors
    }

    pub fn trace(&self) -> &Arc<TraceManager> {
        &self.trace
    }

    /// Bus the host publishes navigation and click events on
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Stops auto-capture and flushes any buffered audit events
    pub fn shutdown(&self) {
        self.tracker.stop();
        self.trace_buffer.stop();
    }
}
