// Request/response logging and the structured log reporter
//
// Console output goes through tracing; remote delivery is fire-and-forget
// with transport failures swallowed, since telemetry must never disrupt the
// host application.

use crate::config::AppConfigStore;
use crate::error::Result;
use crate::http::{Handler, Interceptor, Next, Request, Response};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Installs the console log subscriber, honoring `RUST_LOG`
///
/// Call once at startup from the host binary; the reporter's tracing
/// output goes nowhere without a subscriber.
pub fn init_console_logging() {
    tracing_subscriber::fmt::init();
}

/// Log severity carried on transmitted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log event POSTed to the remote logger host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub app_name: String,
    pub level: LogLevel,
    pub message: String,
    /// ISO-8601 wall-clock timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Reports log events to the console and, when configured, a remote endpoint
///
/// Remote POSTs carry the bypass flag so they never re-enter the pipeline.
pub struct LoggerReporter {
    cfg: Arc<AppConfigStore>,
    transport: Arc<dyn Handler>,
}

impl LoggerReporter {
    pub fn new(cfg: Arc<AppConfigStore>, transport: Arc<dyn Handler>) -> Self {
        Self { cfg, transport }
    }

    /// Logs a message, optionally shipping it to the configured host
    pub fn log(&self, level: LogLevel, message: &str, context: Option<serde_json::Value>) {
        let Ok(cfg) = self.cfg.config() else { return };
        if !cfg.logger.loggers {
            return;
        }

        match level {
            LogLevel::Debug => tracing::debug!("[{}] {}", cfg.app_name, message),
            LogLevel::Info => tracing::info!("[{}] {}", cfg.app_name, message),
            LogLevel::Warn => tracing::warn!("[{}] {}", cfg.app_name, message),
            LogLevel::Error => tracing::error!("[{}] {}", cfg.app_name, message),
        }

        if cfg.logger.loggers_host.is_empty() {
            return;
        }

        let event = LogEvent {
            app_name: cfg.app_name.clone(),
            level,
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            context,
        };
        let Ok(body) = serde_json::to_value(&event) else { return };
        let req = Request::post(cfg.logger.loggers_host.clone(), body).with_bypass(true);

        let transport = self.transport.clone();
        tokio::spawn(async move {
            // Remote log delivery failures are dropped
            let _ = transport.handle(req).await;
        });
    }
}

/// Convenience logging facade over the reporter
pub struct Logger {
    reporter: Arc<LoggerReporter>,
}

impl Logger {
    pub fn new(reporter: Arc<LoggerReporter>) -> Self {
        Self { reporter }
    }

    pub fn debug(&self, message: &str, context: Option<serde_json::Value>) {
        self.reporter.log(LogLevel::Debug, message, context);
    }

    pub fn info(&self, message: &str, context: Option<serde_json::Value>) {
        self.reporter.log(LogLevel::Info, message, context);
    }

    pub fn warn(&self, message: &str, context: Option<serde_json::Value>) {
        self.reporter.log(LogLevel::Warn, message, context);
    }

    pub fn error(&self, message: &str, context: Option<serde_json::Value>) {
        self.reporter.log(LogLevel::Error, message, context);
    }
}

/// Interceptor logging "request sent" and "response received" lines
///
/// Elapsed time is measured on the monotonic clock from interceptor entry to
/// response receipt. Errors are not logged here; that is the error
/// interceptor's job.
pub struct LoggerInterceptor {
    cfg: Arc<AppConfigStore>,
    reporter: Arc<LoggerReporter>,
}

impl LoggerInterceptor {
    pub fn new(cfg: Arc<AppConfigStore>, reporter: Arc<LoggerReporter>) -> Self {
        Self { cfg, reporter }
    }
}

#[async_trait]
impl Interceptor for LoggerInterceptor {
    async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response> {
        if req.bypass() || !self.cfg.config()?.logger.loggers {
            return next.run(req).await;
        }

        let started = Instant::now();
        self.reporter.log(
            LogLevel::Info,
            &format!("HTTP {} → {}", req.method(), req.url()),
            None,
        );

        let method = req.method().clone();
        let url = req.url().to_string();
        let res = next.run(req).await?;

        self.reporter.log(
            LogLevel::Info,
            &format!(
                "HTTP {} ← {} [{}] {}ms",
                method,
                url,
                res.status(),
                started.elapsed().as_millis()
            ),
            None,
        );
        Ok(res)
    }
}
