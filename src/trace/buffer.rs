// Size- and time-bounded batching of audit events
//
// Design Decision: the flush timer is armed lazily when the first event
// lands in an empty buffer, not on a periodic tick. An idle process makes
// no timer noise and a burst of events still flushes immediately on the
// size threshold.

use crate::config::AppConfigStore;
use crate::trace::reporter::TraceReporter;
use crate::trace::types::AuditEvent;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Flush immediately once this many events are buffered
const MAX_BATCH: usize = 500;
/// Smallest accepted flush interval
const MIN_INTERVAL_MS: i64 = 1_000;
/// Interval used when the config does not set one
const DEFAULT_INTERVAL_MS: i64 = 5_000;

struct BufferState {
    events: Vec<AuditEvent>,
    timer: Option<JoinHandle<()>>,
}

/// Accumulates audit events and flushes them to the reporter in batches
///
/// Events flush when the buffer reaches 500 entries or when the interval
/// timer fires, whichever comes first. `stop` flushes whatever remains, so
/// call it on shutdown to avoid losing the tail of the session.
pub struct TraceBuffer {
    cfg: Arc<AppConfigStore>,
    reporter: Arc<TraceReporter>,
    state: Mutex<BufferState>,
    weak_self: Weak<TraceBuffer>,
}

impl TraceBuffer {
    pub fn new(cfg: Arc<AppConfigStore>, reporter: Arc<TraceReporter>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            cfg,
            reporter,
            state: Mutex::new(BufferState {
                events: Vec::new(),
                timer: None,
            }),
            weak_self: weak.clone(),
        })
    }

    fn interval(&self) -> Duration {
        let ms = self
            .cfg
            .config()
            .ok()
            .and_then(|c| c.trace.interval_send)
            .unwrap_or(DEFAULT_INTERVAL_MS)
            .max(MIN_INTERVAL_MS);
        Duration::from_millis(ms as u64)
    }

    /// Enqueues an event, flushing or arming the timer as needed
    ///
    /// Dropped silently when auditing is disabled, so emitters do not have
    /// to re-check the gate.
    pub fn push(&self, event: AuditEvent) {
        let enabled = self
            .cfg
            .config()
            .map(|c| c.trace.audit)
            .unwrap_or(false);
        if !enabled {
            return;
        }

        let mut state = self.state.lock().unwrap();
        state.events.push(event);

        if state.events.len() >= MAX_BATCH {
            Self::flush_locked(&self.reporter, &mut state);
            return;
        }

        // Arm the timer only for the first event of an empty buffer
        if state.timer.is_none() {
            let weak = self.weak_self.clone();
            let interval = self.interval();
            state.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(interval).await;
                if let Some(buffer) = weak.upgrade() {
                    buffer.flush();
                }
            }));
        }
    }

    /// Sends everything buffered and disarms the timer
    pub fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        Self::flush_locked(&self.reporter, &mut state);
    }

    fn flush_locked(reporter: &TraceReporter, state: &mut BufferState) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if state.events.is_empty() {
            return;
        }
        let events = std::mem::take(&mut state.events);
        reporter.send_batch(events);
    }

    /// Final flush for shutdown
    pub fn stop(&self) {
        self.flush();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.state.lock().unwrap().events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, TraceConfig};
    use crate::http::testing::ScriptedHandler;
    use crate::http::Response;
    use crate::trace::types::AuditStage;
    use uuid::Uuid;

    fn store(audit: bool, interval_send: Option<i64>) -> Arc<AppConfigStore> {
        Arc::new(AppConfigStore::with_config(AppConfig {
            app_name: "buffer-test".to_string(),
            trace: TraceConfig {
                audit,
                audit_host: "https://audit.example.com".to_string(),
                interval_send,
            },
            ..Default::default()
        }))
    }

    fn event() -> AuditEvent {
        AuditEvent::new("buffer-test", Uuid::new_v4(), AuditStage::SpanStart)
    }

    fn batch_sizes() -> (Arc<std::sync::Mutex<Vec<usize>>>, Arc<ScriptedHandler>) {
        let sizes = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sizes_clone = sizes.clone();
        let transport = Arc::new(ScriptedHandler::new(move |_, req| {
            let events: Vec<AuditEvent> =
                serde_json::from_value(req.body().unwrap().clone()).unwrap();
            sizes_clone.lock().unwrap().push(events.len());
            Ok(Response::new(200, "OK", req.url()))
        }));
        (sizes, transport)
    }

    #[tokio::test]
    async fn test_size_threshold_flushes_immediately() {
        let cfg = store(true, None);
        let (sizes, transport) = batch_sizes();
        let reporter = Arc::new(TraceReporter::new(cfg.clone(), transport));
        let buffer = TraceBuffer::new(cfg, reporter);

        for _ in 0..MAX_BATCH - 1 {
            buffer.push(event());
        }
        assert_eq!(buffer.len(), MAX_BATCH - 1);
        assert!(sizes.lock().unwrap().is_empty());

        buffer.push(event());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*sizes.lock().unwrap(), vec![MAX_BATCH]);
        assert_eq!(buffer.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_after_interval() {
        let cfg = store(true, Some(2_000));
        let (sizes, transport) = batch_sizes();
        let reporter = Arc::new(TraceReporter::new(cfg.clone(), transport));
        let buffer = TraceBuffer::new(cfg, reporter);

        buffer.push(event());
        buffer.push(event());

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(buffer.len(), 2);

        tokio::time::sleep(Duration::from_millis(200)).await;
        // Let the spawned send task run
        tokio::task::yield_now().await;
        assert_eq!(*sizes.lock().unwrap(), vec![2]);
        assert_eq!(buffer.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_clamped_to_minimum() {
        let cfg = store(true, Some(10));
        let (sizes, transport) = batch_sizes();
        let reporter = Arc::new(TraceReporter::new(cfg.clone(), transport));
        let buffer = TraceBuffer::new(cfg, reporter);

        buffer.push(event());
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(buffer.len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(*sizes.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_stop_flushes_remainder() {
        let cfg = store(true, None);
        let (sizes, transport) = batch_sizes();
        let reporter = Arc::new(TraceReporter::new(cfg.clone(), transport));
        let buffer = TraceBuffer::new(cfg, reporter);

        buffer.push(event());
        buffer.push(event());
        buffer.push(event());
        buffer.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*sizes.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_disabled_drops_events() {
        let cfg = store(false, None);
        let (sizes, transport) = batch_sizes();
        let reporter = Arc::new(TraceReporter::new(cfg.clone(), transport));
        let buffer = TraceBuffer::new(cfg, reporter);

        buffer.push(event());
        assert_eq!(buffer.len(), 0);
        buffer.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sizes.lock().unwrap().is_empty());
    }
}
