// Span and audit event types for the trace pipeline

use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Kind of work a span covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Route,
    Method,
    Http,
    Click,
    Custom,
}

/// A timed unit of work on the process-wide span stack
#[derive(Debug, Clone)]
pub struct TraceSpan {
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    /// Constant for the whole process session
    pub trace_id: Uuid,
    pub kind: SpanKind,
    pub name: String,
    /// Monotonic start reference for duration computation
    pub started: Instant,
    pub meta: Option<serde_json::Value>,
}

/// Stage of an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    SpanStart,
    SpanEnd,
    Navigation,
    Click,
    Request,
    Response,
    Error,
}

/// Flattened, transmittable record of a span transition or discrete occurrence
///
/// Created by the trace manager (span_start/span_end) or the auto-tracker
/// (navigation/click); consumed by the buffer; gone once handed to the
/// reporter. There is no persistence or cross-restart retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub app_name: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SpanKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub stage: AuditStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// ISO-8601 wall-clock timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl AuditEvent {
    /// Minimal event with the always-present fields
    pub fn new(app_name: impl Into<String>, trace_id: Uuid, stage: AuditStage) -> Self {
        Self {
            app_name: app_name.into(),
            trace_id: trace_id.to_string(),
            span_id: None,
            parent_span_id: None,
            kind: None,
            name: None,
            method: None,
            url: None,
            stage,
            status: None,
            duration_ms: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            extra: None,
        }
    }
}
