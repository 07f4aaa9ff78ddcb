// Automatic capture of navigation and click events into the audit stream

use crate::config::AppConfigStore;
use crate::events::{EventBus, UiEvent};
use crate::trace::buffer::TraceBuffer;
use crate::trace::manager::TraceManager;
use crate::trace::types::{AuditEvent, AuditStage, SpanKind};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Longest click text captured; anything beyond is cut off
const MAX_CLICK_TEXT: usize = 80;
/// Tag recorded when the click source element is unknown
const UNKNOWN_TAG: &str = "UNKNOWN";

/// Subscribes to the UI event bus and turns navigations and clicks into
/// audit events
///
/// Start is idempotent-enough for practical use: calling it again replaces
/// the previous subscription. `stop` cancels the subscription and flushes
/// the buffer.
pub struct AutoTracker {
    cfg: Arc<AppConfigStore>,
    manager: Arc<TraceManager>,
    buffer: Arc<TraceBuffer>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoTracker {
    pub fn new(
        cfg: Arc<AppConfigStore>,
        manager: Arc<TraceManager>,
        buffer: Arc<TraceBuffer>,
    ) -> Self {
        Self {
            cfg,
            manager,
            buffer,
            task: Mutex::new(None),
        }
    }

    /// Begins consuming the bus; no-op when auditing is disabled or no bus
    /// is wired up
    pub fn start(&self, bus: Option<&EventBus>) {
        let enabled = self
            .cfg
            .config()
            .map(|c| c.trace.audit)
            .unwrap_or(false);
        if !enabled {
            return;
        }
        let Some(bus) = bus else { return };

        let mut rx = bus.subscribe();
        let cfg = self.cfg.clone();
        let manager = self.manager.clone();
        let buffer = self.buffer.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => Self::record(&cfg, &manager, &buffer, event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Auto-tracker lagged, {} events dropped", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut task = self.task.lock().unwrap();
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    fn record(
        cfg: &AppConfigStore,
        manager: &TraceManager,
        buffer: &TraceBuffer,
        event: UiEvent,
    ) {
        let app_name = cfg
            .config()
            .map(|c| c.app_name.clone())
            .unwrap_or_default();
        match event {
            UiEvent::Navigation { url, title } => {
                let mut ev =
                    AuditEvent::new(app_name, manager.trace_id(), AuditStage::Navigation);
                ev.kind = Some(SpanKind::Route);
                ev.url = Some(url);
                ev.extra = Some(serde_json::json!({ "title": title }));
                buffer.push(ev);
            }
            UiEvent::Click { tag, text, url } => {
                let mut ev = AuditEvent::new(app_name, manager.trace_id(), AuditStage::Click);
                ev.kind = Some(SpanKind::Click);
                ev.url = url;
                let tag = tag.unwrap_or_else(|| UNKNOWN_TAG.to_string());
                // Trim first so surrounding whitespace never eats into the cap
                let text: String = text.trim().chars().take(MAX_CLICK_TEXT).collect();
                ev.extra = Some(serde_json::json!({ "tag": tag, "text": text }));
                buffer.push(ev);
            }
        }
    }

    /// Cancels the subscription and flushes whatever is buffered
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
        self.buffer.stop();
    }
}
