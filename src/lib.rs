// Library interface for Corekit
// This exposes the cross-cutting HTTP and telemetry stack as a library:
// - An interceptor-based HTTP client (cache, loading, auth, trace, log,
//   error reporting, retry)
// - Client-side tracing with batched delivery
// - Config-driven services: storage, secure storage, feature flags

pub mod auth;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod flags;
pub mod http;
pub mod loading;
pub mod logger;
pub mod report;
pub mod rest;
pub mod retry;
pub mod security;
pub mod storage;
pub mod trace;

// Re-export commonly used types for convenience
pub use crate::core::{Core, CoreBuilder};
pub use config::{AppConfig, AppConfigStore, DEFAULT_CONFIG_URL};
pub use error::{CoreError, Result};
pub use events::{EventBus, UiEvent};
pub use http::client::CoreClient;
pub use http::{Handler, Interceptor, Next, Request, Response};

// Service layer re-exports; each is also reachable through `Core`
pub use auth::AuthTokenService;
pub use cache::CacheService;
pub use flags::FeatureFlags;
pub use loading::GlobalLoadingService;
pub use logger::{init_console_logging, LogLevel, Logger};
pub use report::{ErrorPayload, ErrorReporter, JsErrorHandler};
pub use rest::Resource;
pub use security::{CryptoService, SecureStorage};
pub use storage::{MemoryStorage, StorageBackend, StorageService};
pub use trace::{traced, AutoTracker, SpanKind, TraceManager};
