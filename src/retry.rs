// Bounded fixed-delay retry interceptor
//
// Telemetry endpoints (error, logger, audit hosts) are excluded along with
// the configured exception list so a failing reporter can never turn into a
// retry storm feeding itself.

use crate::config::{AppConfig, AppConfigStore};
use crate::error::Result;
use crate::http::{Interceptor, Next, Request, Response};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of the retry decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub allow: bool,
    /// Additional attempts after the original call
    pub count: u32,
    /// Fixed delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl RetryDecision {
    const DENY: RetryDecision = RetryDecision {
        allow: false,
        count: 0,
        delay_ms: 0,
    };
}

/// Decides whether and how a request may be retried
///
/// Denies when the bypass flag is set, retries are disabled, maxRetries is
/// not positive, or the URL matches (case-insensitive substring) either the
/// configured exception list or any of the four reporter hosts. Counts and
/// delays clamp below at zero.
pub fn should_retry(req: &Request, cfg: &AppConfig) -> RetryDecision {
    let retries = &cfg.http.retries;
    if req.bypass() || !retries.retries_http_request || retries.max_retries <= 0 {
        return RetryDecision::DENY;
    }

    let count = retries.max_retries.max(0) as u32;

    let reporter_hosts = [
        cfg.errors.http_errors_host.as_str(),
        cfg.errors.js_errors_host.as_str(),
        cfg.trace.audit_host.as_str(),
        cfg.logger.loggers_host.as_str(),
    ];
    let url = req.url().to_lowercase();
    let excluded = retries
        .exceptions_http
        .iter()
        .map(String::as_str)
        .chain(reporter_hosts)
        .filter(|p| !p.is_empty())
        .any(|p| url.contains(&p.to_lowercase()));

    if excluded {
        return RetryDecision::DENY;
    }

    RetryDecision {
        allow: true,
        count,
        delay_ms: retries.max_interval.max(0) as u64,
    }
}

/// Interceptor re-invoking the downstream chain on failure
///
/// Fixed count, fixed delay; the first success short-circuits remaining
/// attempts and the final failure propagates unchanged.
pub struct RetryInterceptor {
    cfg: Arc<AppConfigStore>,
}

impl RetryInterceptor {
    pub fn new(cfg: Arc<AppConfigStore>) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl Interceptor for RetryInterceptor {
    async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response> {
        let decision = should_retry(&req, self.cfg.config()?);
        if !decision.allow {
            return next.run(req).await;
        }

        let mut last_err = match next.run(req.clone()).await {
            Ok(res) => return Ok(res),
            Err(e) => e,
        };

        for _ in 0..decision.count {
            if decision.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(decision.delay_ms)).await;
            }
            match next.run(req.clone()).await {
                Ok(res) => return Ok(res),
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ErrorsConfig, HttpConfig, LoggerConfig, RetriesConfig, TraceConfig};
    use crate::http::testing::{http_error, ScriptedHandler};

    fn config(retries: RetriesConfig) -> AppConfig {
        AppConfig {
            app_name: "retry-test".to_string(),
            http: HttpConfig {
                retries,
                ..Default::default()
            },
            errors: ErrorsConfig {
                http_errors_host: "https://errors.example.com/http".to_string(),
                js_errors_host: "https://errors.example.com/js".to_string(),
                ..Default::default()
            },
            trace: TraceConfig {
                audit_host: "https://audit.example.com".to_string(),
                ..Default::default()
            },
            logger: LoggerConfig {
                loggers_host: "https://logs.example.com".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn enabled(max_retries: i64, max_interval: i64) -> AppConfig {
        config(RetriesConfig {
            retries_http_request: true,
            max_retries,
            max_interval,
            exceptions_http: vec!["/no-retry".to_string()],
        })
    }

    #[test]
    fn test_decision_denies_when_disabled_or_zero() {
        let req = Request::get("https://api.example.com/users");
        assert!(!should_retry(&req, &config(RetriesConfig::default())).allow);
        assert!(!should_retry(&req, &enabled(0, 10)).allow);
        assert!(!should_retry(&req, &enabled(-3, 10)).allow);
    }

    #[test]
    fn test_decision_denies_bypass() {
        let req = Request::get("https://api.example.com/users").with_bypass(true);
        assert!(!should_retry(&req, &enabled(3, 10)).allow);
    }

    #[test]
    fn test_decision_denies_exceptions_and_reporter_hosts() {
        let cfg = enabled(3, 10);
        for url in [
            "https://api.example.com/no-retry/items",
            "https://errors.example.com/http",
            "https://ERRORS.example.com/js",
            "https://audit.example.com/batch",
            "https://logs.example.com/ingest",
        ] {
            assert!(!should_retry(&Request::get(url), &cfg).allow, "{}", url);
        }
    }

    #[test]
    fn test_decision_allows_with_clamped_values() {
        let cfg = enabled(3, -50);
        let d = should_retry(&Request::get("https://api.example.com/users"), &cfg);
        assert_eq!(
            d,
            RetryDecision {
                allow: true,
                count: 3,
                delay_ms: 0
            }
        );
    }

    #[tokio::test]
    async fn test_all_attempts_fail_yields_original_error() {
        let cfg = Arc::new(AppConfigStore::with_config(enabled(3, 0)));
        let terminal =
            ScriptedHandler::new(|_, req| Err(http_error(500, "GET", req.url())));
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(RetryInterceptor::new(cfg))];

        let err = Next::new(&chain, &terminal)
            .run(Request::get("https://api.example.com/users"))
            .await
            .unwrap_err();

        // 1 original + 3 retries
        assert_eq!(terminal.call_count(), 4);
        assert_eq!(err.http_status(), Some(500));
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let cfg = Arc::new(AppConfigStore::with_config(enabled(5, 0)));
        let terminal = ScriptedHandler::new(|n, req| {
            if n < 2 {
                Err(http_error(503, "GET", req.url()))
            } else {
                Ok(Response::new(200, "OK", req.url()))
            }
        });
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(RetryInterceptor::new(cfg))];

        let res = Next::new(&chain, &terminal)
            .run(Request::get("https://api.example.com/users"))
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        assert_eq!(terminal.call_count(), 3);
    }

    #[tokio::test]
    async fn test_excluded_url_is_not_retried() {
        let cfg = Arc::new(AppConfigStore::with_config(enabled(3, 0)));
        let terminal =
            ScriptedHandler::new(|_, req| Err(http_error(500, "GET", req.url())));
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(RetryInterceptor::new(cfg))];

        Next::new(&chain, &terminal)
            .run(Request::get("https://audit.example.com/batch"))
            .await
            .unwrap_err();

        assert_eq!(terminal.call_count(), 1);
    }
}
