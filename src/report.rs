// Error reporting: payload shape, delivery, and the interceptors that feed it
//
// Two error families share one payload: HTTP failures caught in the
// pipeline and application ("js") errors handed in by the host. Reporting
// must never make things worse, so delivery is fire-and-forget with the
// bypass flag set, and the original error always propagates unchanged.

use crate::config::AppConfigStore;
use crate::error::{CoreError, Result};
use crate::http::{Handler, Interceptor, Next, Request, Response};
use crate::trace::TraceManager;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Family of a reported error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Http,
    Js,
}

/// Error record POSTed to the error collector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub app_name: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// ISO-8601 wall-clock timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl ErrorPayload {
    pub fn new(app_name: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            kind,
            message: message.into(),
            stack: None,
            url: None,
            method: None,
            status: None,
            status_text: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            extra: None,
        }
    }
}

/// Ships error payloads to the host matching their family
///
/// Each family has its own enable flag and host; when the flag is on but the
/// host is empty the payload only reaches the console log.
pub struct ErrorReporter {
    cfg: Arc<AppConfigStore>,
    transport: Arc<dyn Handler>,
}

impl ErrorReporter {
    pub fn new(cfg: Arc<AppConfigStore>, transport: Arc<dyn Handler>) -> Self {
        Self { cfg, transport }
    }

    /// Builds an HTTP-family payload from a status-carrying failure
    pub fn http_payload(&self, err: &CoreError, extra: Option<serde_json::Value>) -> ErrorPayload {
        let app_name = self
            .cfg
            .config()
            .map(|c| c.app_name.clone())
            .unwrap_or_default();
        let mut payload = ErrorPayload::new(app_name, ErrorKind::Http, err.to_string());
        if let CoreError::HttpStatus {
            status,
            status_text,
            method,
            url,
            ..
        } = err
        {
            payload.status = Some(*status);
            payload.status_text = Some(status_text.clone());
            payload.method = Some(method.clone());
            payload.url = Some(url.clone());
        }
        payload.extra = extra;
        payload
    }

    /// Builds a JS-family payload from an arbitrary application error
    pub fn js_payload(
        &self,
        message: impl Into<String>,
        stack: Option<String>,
        extra: Option<serde_json::Value>,
    ) -> ErrorPayload {
        let app_name = self
            .cfg
            .config()
            .map(|c| c.app_name.clone())
            .unwrap_or_default();
        let mut payload = ErrorPayload::new(app_name, ErrorKind::Js, message);
        payload.stack = stack;
        payload.extra = extra;
        payload
    }

    /// Reports a payload to its family's host, if enabled and configured
    pub fn report(&self, payload: ErrorPayload) {
        let Ok(cfg) = self.cfg.config() else { return };
        let (enabled, host) = match payload.kind {
            ErrorKind::Http => (cfg.errors.http_errors, cfg.errors.http_errors_host.as_str()),
            ErrorKind::Js => (cfg.errors.js_errors, cfg.errors.js_errors_host.as_str()),
        };
        if !enabled || host.is_empty() {
            return;
        }

        let Ok(body) = serde_json::to_value(&payload) else { return };
        let req = Request::post(host.to_string(), body).with_bypass(true);

        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.handle(req).await {
                tracing::debug!("Error report delivery failed: {}", e);
            }
        });
    }

    pub fn report_http(&self, err: &CoreError, extra: Option<serde_json::Value>) {
        self.report(self.http_payload(err, extra));
    }

    pub fn report_js(
        &self,
        message: impl Into<String>,
        stack: Option<String>,
        extra: Option<serde_json::Value>,
    ) {
        self.report(self.js_payload(message, stack, extra));
    }
}

/// Interceptor reporting HTTP failures as they pass back up the chain
///
/// The report carries the current trace id and innermost open method span
/// so the backend can tie the failure to what the user was doing. The error
/// itself is re-thrown untouched.
pub struct HttpErrorInterceptor {
    cfg: Arc<AppConfigStore>,
    reporter: Arc<ErrorReporter>,
    manager: Arc<TraceManager>,
}

impl HttpErrorInterceptor {
    pub fn new(
        cfg: Arc<AppConfigStore>,
        reporter: Arc<ErrorReporter>,
        manager: Arc<TraceManager>,
    ) -> Self {
        Self {
            cfg,
            reporter,
            manager,
        }
    }
}

#[async_trait]
impl Interceptor for HttpErrorInterceptor {
    async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response> {
        let cfg = self.cfg.config()?;
        if req.bypass() || !(cfg.errors.http_errors || cfg.logger.loggers) {
            return next.run(req).await;
        }

        match next.run(req).await {
            Ok(res) => Ok(res),
            Err(err) => {
                if matches!(err, CoreError::HttpStatus { .. }) {
                    tracing::error!("{}", err);
                    let extra = serde_json::json!({
                        "traceId": self.manager.trace_id().to_string(),
                        "activeMethodSpan": self.manager.active_method_name(),
                    });
                    self.reporter.report_http(&err, Some(extra));
                }
                Err(err)
            }
        }
    }
}

/// Entry point for application errors outside the HTTP pipeline
///
/// HTTP-status failures are skipped here: the interceptor already reported
/// them and reporting twice would double-count. Everything else is shipped
/// as a JS-family error when reporting is enabled, or logged to the console
/// otherwise.
pub struct JsErrorHandler {
    cfg: Arc<AppConfigStore>,
    reporter: Arc<ErrorReporter>,
    manager: Arc<TraceManager>,
}

impl JsErrorHandler {
    pub fn new(
        cfg: Arc<AppConfigStore>,
        reporter: Arc<ErrorReporter>,
        manager: Arc<TraceManager>,
    ) -> Self {
        Self {
            cfg,
            reporter,
            manager,
        }
    }

    /// Handles an uncaught application error
    pub fn handle(&self, err: &(dyn std::error::Error + 'static)) {
        if let Some(core) = err.downcast_ref::<CoreError>() {
            if matches!(core, CoreError::HttpStatus { .. }) {
                return;
            }
        }

        let Ok(cfg) = self.cfg.config() else {
            tracing::error!("Unhandled error: {}", err);
            return;
        };
        if cfg.errors.js_errors || cfg.logger.loggers {
            let stack = err.source().map(|s| s.to_string());
            let extra = serde_json::json!({
                "traceId": self.manager.trace_id().to_string(),
                "activeMethodSpan": self.manager.active_method_name(),
            });
            self.reporter
                .report_js(err.to_string(), stack, Some(extra));
        } else {
            tracing::error!("Unhandled error: {}", err);
        }
    }
}
