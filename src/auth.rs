// Auth token storage and JWT injection interceptor

use crate::config::AppConfigStore;
use crate::error::Result;
use crate::http::{Interceptor, Next, Request};
use crate::http::Response;
use crate::storage::StorageService;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use std::sync::Arc;

const TOKEN_KEY: &str = "auth-app";

/// Storage-backed holder for the authentication token
///
/// Retrieval is a pure read; there is no refresh logic here.
pub struct AuthTokenService {
    storage: Arc<StorageService>,
}

impl AuthTokenService {
    pub fn new(storage: Arc<StorageService>) -> Self {
        Self { storage }
    }

    /// Stored token, or None
    pub fn get(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY)
    }

    pub fn set(&self, token: &str) {
        self.storage.set(TOKEN_KEY, &token);
    }

    pub fn clear(&self) {
        self.storage.remove(TOKEN_KEY);
    }

    /// Whether a token value is stored
    ///
    /// Presence-only: an empty string counts as present here even though the
    /// interceptor will not attach it.
    pub fn has(&self) -> bool {
        self.get().is_some()
    }
}

/// Whether the URL matches any exclusion substring (case-insensitive)
fn is_excluded(url_with_params: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let u = url_with_params.to_lowercase();
    patterns.iter().any(|p| u.contains(&p.to_lowercase()))
}

/// Interceptor adding `Authorization: Bearer <token>` to outgoing requests
///
/// Skips bypassed requests, requests without a non-empty stored token, and
/// URLs matching the configured exclusion substrings. An existing
/// Authorization header is overwritten.
pub struct JwtInterceptor {
    cfg: Arc<AppConfigStore>,
    tokens: Arc<AuthTokenService>,
}

impl JwtInterceptor {
    pub fn new(cfg: Arc<AppConfigStore>, tokens: Arc<AuthTokenService>) -> Self {
        Self { cfg, tokens }
    }
}

#[async_trait]
impl Interceptor for JwtInterceptor {
    async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response> {
        if req.bypass() {
            return next.run(req).await;
        }

        let cfg = self.cfg.config()?;
        if !cfg.http.add_token_jwt {
            return next.run(req).await;
        }

        let token = match self.tokens.get() {
            Some(t) if !t.is_empty() => t,
            _ => return next.run(req).await,
        };

        if is_excluded(req.url(), &cfg.http.exclude_token_jwt) {
            return next.run(req).await;
        }

        let value = match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(v) => v,
            // Token with non-header-safe bytes: forward unauthenticated
            Err(_) => return next.run(req).await,
        };

        next.run(req.with_header(AUTHORIZATION, value)).await
    }
}
