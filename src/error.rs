// Centralized error handling using thiserror for type-safe error management
//
// Design Decision: Unified error type with context
//
// Rationale: Instead of using Box<dyn Error> throughout, we define specific
// error variants that map to different failure modes in the pipeline.
// This enables pattern matching (the error interceptor and the retry
// interceptor both need to distinguish status-carrying HTTP failures from
// transport failures), better error messages, and type safety.
//
// Trade-offs:
// - Type Safety: Specific error types vs. generic Box<dyn Error>
// - Ergonomics: thiserror auto-derives Display and Error trait
// - Conversion: #[from] attribute handles automatic conversions from std errors
//
// Extension Points: Add new error variants as needed for specific failure modes

use thiserror::Error;

/// Main error type for the corekit pipeline
///
/// Each variant provides contextual information about what went wrong.
///
/// Error Handling Strategy:
/// - IO errors: Automatically converted via #[from] Io variant
/// - Serde errors: Automatically converted via #[from] Serde variant
/// - HTTP transport errors: Automatically converted via #[from] Reqwest variant
/// - Status-carrying HTTP failures: HttpStatus variant, built by the terminal
///   transport for non-2xx responses so interceptors can inspect the status
/// - Crypto errors: collapsed to two generic kinds; the detailed cause is
///   logged at the failure site and never carried in the error itself
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration was read before `AppConfigStore::load` completed
    #[error("AppConfig not loaded yet")]
    ConfigNotLoaded,

    /// Configuration loading or validation error
    ///
    /// Covers config fetch failures (non-2xx status plus body text) and
    /// lookups of API modules that do not exist in the configuration file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request completed with a non-success status
    ///
    /// This is the status-carrying failure the error-reporting and retry
    /// interceptors key on. Transport-level failures (DNS, refused
    /// connection) surface as `Reqwest` instead.
    #[error("HTTP {status} {status_text} for {method} {url}")]
    HttpStatus {
        status: u16,
        status_text: String,
        method: String,
        url: String,
        /// Response body text, empty if the body read itself failed
        body: String,
    },

    /// Encryption failed
    ///
    /// Deliberately generic: the cause is logged, never exposed, so error
    /// messages cannot leak key material or plaintext structure.
    #[error("Error while encrypting data.")]
    Encrypt,

    /// Decryption failed (malformed input, authentication failure, bad JSON)
    #[error("Error while decrypting data.")]
    Decrypt,

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Event bus communication error
    #[error("Event bus error: {0}")]
    Event(String),

    /// IO operation failed (file, network, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// HTTP transport failed before a status was available
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl CoreError {
    /// Status code if this is a status-carrying HTTP failure
    ///
    /// Used by the error interceptor (report HTTP errors only) and the JS
    /// error handler (skip HTTP errors to avoid double reporting).
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CoreError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Type alias for Result with CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

// Conversion from anyhow::Error for interop with callers using anyhow
impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}
