// Delivery of audit event batches to the configured collector

use crate::config::AppConfigStore;
use crate::http::{Handler, Request};
use crate::trace::types::AuditEvent;
use std::sync::Arc;

/// POSTs audit events to the audit host
///
/// Sends are fire-and-forget: the batch is handed to a spawned task and any
/// transport failure is logged and dropped. Outgoing requests carry the
/// bypass flag so the pipeline never traces its own telemetry.
pub struct TraceReporter {
    cfg: Arc<AppConfigStore>,
    transport: Arc<dyn Handler>,
}

impl TraceReporter {
    pub fn new(cfg: Arc<AppConfigStore>, transport: Arc<dyn Handler>) -> Self {
        Self { cfg, transport }
    }

    /// Ships a single event
    pub fn send(&self, event: AuditEvent) {
        self.send_batch(vec![event]);
    }

    /// Ships a batch of events as one JSON array POST
    ///
    /// No-op when auditing is disabled, the host is empty, or the batch is
    /// empty.
    pub fn send_batch(&self, events: Vec<AuditEvent>) {
        if events.is_empty() {
            return;
        }
        let Ok(cfg) = self.cfg.config() else { return };
        if !cfg.trace.audit || cfg.trace.audit_host.is_empty() {
            return;
        }

        let Ok(body) = serde_json::to_value(&events) else { return };
        let req = Request::post(cfg.trace.audit_host.clone(), body).with_bypass(true);

        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.handle(req).await {
                tracing::debug!("Audit batch delivery failed: {}", e);
            }
        });
    }
}
