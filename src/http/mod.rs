// HTTP pipeline primitives: request/response model, interceptor chain, transport
//
// Design Decision: Explicit ordered middleware list over a boxed-future chain
//
// Rationale: Interceptors compose as data, not call-site nesting. The client
// holds a Vec of trait objects in a fixed order; `Next` walks the slice and
// hands the tail to each interceptor. This makes the pipeline order trivially
// testable in isolation and lets any interceptor:
// 1. Short-circuit (serve from cache without touching the transport)
// 2. Decorate (clone the request with extra headers)
// 3. Wrap (re-invoke the full downstream chain, e.g. retry)
//
// Trade-offs:
// - Dynamic dispatch per hop vs. static tower-style layering (negligible for
//   a client-side pipeline, and far easier to reorder/configure at runtime)
//
// The terminal `Handler` is swappable, which is how unit tests count
// downstream invocations without a live network.

pub mod client;

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// An outgoing HTTP request flowing through the interceptor chain
///
/// The URL is carried fully resolved, query string included. The bypass flag
/// is the per-request marker telemetry calls set so interceptors skip them;
/// it defaults to false.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    bypass: bool,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            bypass: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PUT, url).with_body(body)
    }

    pub fn patch(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PATCH, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a header, overwriting any existing value
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Marks this request so every interceptor forwards it untouched
    ///
    /// Used by the telemetry reporters (logs, traces, error payloads) to keep
    /// their own POSTs from re-entering the pipeline.
    pub fn with_bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full URL including the query string
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn bypass(&self) -> bool {
        self.bypass
    }
}

/// A successful HTTP response
///
/// Non-2xx statuses never reach this type; the terminal transport converts
/// them into `CoreError::HttpStatus` so interceptors can treat them as
/// failures, matching the retry and error-reporting semantics.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    status_text: String,
    url: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, status_text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            url: url.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_json_body(mut self, body: &impl serde::Serialize) -> Self {
        self.body = serde_json::to_vec(body).unwrap_or_default();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Terminal request executor at the end of the interceptor chain
///
/// Production uses `ReqwestTransport`; tests substitute counting or scripted
/// handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: Request) -> Result<Response>;
}

/// A composable request/response transform in the pipeline
///
/// Each interceptor receives the request and the remainder of the chain and
/// may short-circuit, decorate, or wrap the downstream call.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response>;
}

/// The remainder of the interceptor chain plus the terminal handler
///
/// Copyable so a wrapping interceptor (retry) can re-run the downstream
/// portion for every attempt.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    terminal: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub fn new(interceptors: &'a [Arc<dyn Interceptor>], terminal: &'a dyn Handler) -> Self {
        Self {
            interceptors,
            terminal,
        }
    }

    /// Forwards the request to the rest of the chain
    pub async fn run(self, req: Request) -> Result<Response> {
        match self.interceptors.split_first() {
            Some((head, rest)) => {
                head.intercept(
                    req,
                    Next {
                        interceptors: rest,
                        terminal: self.terminal,
                    },
                )
                .await
            }
            None => self.terminal.handle(req).await,
        }
    }
}

/// Terminal transport backed by reqwest
///
/// Converts non-success statuses into `CoreError::HttpStatus`, carrying the
/// response URL and the body text (empty if the body read fails).
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for ReqwestTransport {
    async fn handle(&self, req: Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(req.method().clone(), req.url())
            .headers(req.headers().clone());

        if let Some(body) = req.body() {
            builder = builder.json(body);
        }

        let res = builder.send().await?;
        let status = res.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let url = res.url().to_string();
        let headers = res.headers().clone();

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::HttpStatus {
                status: status.as_u16(),
                status_text,
                method: req.method().to_string(),
                url,
                body,
            });
        }

        let body = res.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        Ok(Response {
            status: status.as_u16(),
            status_text,
            url,
            headers,
            body,
        })
    }
}
