// HTTP span instrumentation and trace header propagation

use crate::config::AppConfigStore;
use crate::error::Result;
use crate::http::{Interceptor, Next, Request, Response};
use crate::trace::manager::TraceManager;
use crate::trace::types::SpanKind;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use std::sync::Arc;

pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");
pub const SPAN_ID_HEADER: HeaderName = HeaderName::from_static("x-span-id");

/// Interceptor wrapping each request in an HTTP span
///
/// Adds X-Trace-Id and X-Span-Id headers so the backend can correlate, ends
/// the span with the response status on success or the error message on
/// failure, and re-throws failures unchanged.
pub struct TraceInterceptor {
    cfg: Arc<AppConfigStore>,
    manager: Arc<TraceManager>,
}

impl TraceInterceptor {
    pub fn new(cfg: Arc<AppConfigStore>, manager: Arc<TraceManager>) -> Self {
        Self { cfg, manager }
    }
}

#[async_trait]
impl Interceptor for TraceInterceptor {
    async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response> {
        if req.bypass() || !self.cfg.config()?.trace.audit {
            return next.run(req).await;
        }

        let span = self.manager.start_span(
            format!("HTTP {}", req.method()),
            SpanKind::Http,
            Some(serde_json::json!({ "url": req.url() })),
        );

        // Uuid's hyphenated form is always a valid header value
        let trace_id = HeaderValue::from_str(&span.trace_id.to_string())
            .unwrap_or(HeaderValue::from_static(""));
        let span_id = HeaderValue::from_str(&span.span_id.to_string())
            .unwrap_or(HeaderValue::from_static(""));
        let req = req
            .with_header(TRACE_ID_HEADER, trace_id)
            .with_header(SPAN_ID_HEADER, span_id);

        match next.run(req).await {
            Ok(res) => {
                self.manager
                    .end_span(&span, Some(serde_json::json!({ "status": res.status() })));
                Ok(res)
            }
            Err(e) => {
                self.manager
                    .end_span(&span, Some(serde_json::json!({ "error": e.to_string() })));
                Err(e)
            }
        }
    }
}
