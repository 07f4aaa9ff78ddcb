// Span lifecycle management over a process-wide stack
//
// Design Decision: one trace id per process session, minted at construction.
// Spans form a stack so that a newly started span parents onto whatever is
// currently active, but ending is tolerant of out-of-order completion:
// ending a span that is not on top removes it from the middle of the stack
// without disturbing its neighbours.

use crate::config::AppConfigStore;
use crate::trace::buffer::TraceBuffer;
use crate::trace::types::{AuditEvent, AuditStage, SpanKind, TraceSpan};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

pub struct TraceManager {
    cfg: Arc<AppConfigStore>,
    buffer: Arc<TraceBuffer>,
    stack: Mutex<Vec<TraceSpan>>,
    trace_id: Uuid,
}

impl TraceManager {
    pub fn new(cfg: Arc<AppConfigStore>, buffer: Arc<TraceBuffer>) -> Self {
        Self {
            cfg,
            buffer,
            stack: Mutex::new(Vec::new()),
            trace_id: Uuid::new_v4(),
        }
    }

    /// Session-constant trace id
    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    fn app_name(&self) -> String {
        self.cfg
            .config()
            .map(|c| c.app_name.clone())
            .unwrap_or_default()
    }

    /// Starts a span parented on the currently active one and emits its
    /// start event
    pub fn start_span(
        &self,
        name: impl Into<String>,
        kind: SpanKind,
        meta: Option<serde_json::Value>,
    ) -> TraceSpan {
        let mut stack = self.stack.lock().unwrap();
        let span = TraceSpan {
            span_id: Uuid::new_v4(),
            parent_span_id: stack.last().map(|s| s.span_id),
            trace_id: self.trace_id,
            kind,
            name: name.into(),
            started: Instant::now(),
            meta,
        };
        stack.push(span.clone());
        drop(stack);

        let mut event = AuditEvent::new(self.app_name(), self.trace_id, AuditStage::SpanStart);
        event.span_id = Some(span.span_id.to_string());
        event.parent_span_id = span.parent_span_id.map(|id| id.to_string());
        event.kind = Some(span.kind);
        event.name = Some(span.name.clone());
        event.extra = span.meta.clone();
        self.buffer.push(event);

        span
    }

    /// Ends a span, removing it from the stack wherever it sits, and emits
    /// its end event with the measured duration
    pub fn end_span(&self, span: &TraceSpan, extra: Option<serde_json::Value>) {
        let mut stack = self.stack.lock().unwrap();
        if let Some(pos) = stack.iter().position(|s| s.span_id == span.span_id) {
            stack.remove(pos);
        }
        drop(stack);

        let mut event = AuditEvent::new(self.app_name(), self.trace_id, AuditStage::SpanEnd);
        event.span_id = Some(span.span_id.to_string());
        event.parent_span_id = span.parent_span_id.map(|id| id.to_string());
        event.kind = Some(span.kind);
        event.name = Some(span.name.clone());
        event.duration_ms = Some(span.started.elapsed().as_millis() as u64);
        event.extra = extra;
        self.buffer.push(event);
    }

    /// Runs an async operation inside a span
    ///
    /// The span always ends, carrying `{"error": ...}` when the operation
    /// fails; the failure itself propagates unchanged.
    pub async fn run_with_span<T, E, F, Fut>(
        &self,
        name: impl Into<String>,
        kind: SpanKind,
        meta: Option<serde_json::Value>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let span = self.start_span(name, kind, meta);
        match f().await {
            Ok(value) => {
                self.end_span(&span, None);
                Ok(value)
            }
            Err(e) => {
                self.end_span(&span, Some(serde_json::json!({ "error": e.to_string() })));
                Err(e)
            }
        }
    }

    /// Most recently started span, if any
    pub fn active_span(&self) -> Option<TraceSpan> {
        self.stack.lock().unwrap().last().cloned()
    }

    /// Name of the innermost open method span, for error correlation
    pub fn active_method_name(&self) -> Option<String> {
        self.stack
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.kind == SpanKind::Method)
            .map(|s| s.name.clone())
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.stack.lock().unwrap().len()
    }
}
