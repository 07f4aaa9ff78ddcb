// Global loading state driven by an in-flight request counter
//
// A counter, not a boolean, tracks concurrency: "started" fires on the 0→1
// transition and "stopped" on 1→0, so overlapping requests signal exactly
// once each way. The decrement rides a drop guard, which also covers callers
// that abort a request mid-flight (the future is dropped, the guard runs).

use crate::config::AppConfigStore;
use crate::error::Result;
use crate::http::{Interceptor, Next, Request, Response};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Observable global loading flag
///
/// Contract: readable current value plus change subscription; no framework
/// reactive primitive is assumed.
pub struct GlobalLoadingService {
    tx: watch::Sender<bool>,
}

impl GlobalLoadingService {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Current loading state
    pub fn loading(&self) -> bool {
        *self.tx.borrow()
    }

    /// Sets the loading state
    pub fn set(&self, state: bool) {
        self.tx.send_replace(state);
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for GlobalLoadingService {
    fn default() -> Self {
        Self::new()
    }
}

struct CounterState {
    count: Mutex<usize>,
    loading: Arc<GlobalLoadingService>,
}

/// Decrements the in-flight counter when dropped, on every exit path
struct InFlightGuard {
    state: Arc<CounterState>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.state.count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.state.loading.set(false);
        }
    }
}

/// Interceptor maintaining the process-wide in-flight request counter
pub struct LoadingInterceptor {
    cfg: Arc<AppConfigStore>,
    state: Arc<CounterState>,
}

impl LoadingInterceptor {
    pub fn new(cfg: Arc<AppConfigStore>, loading: Arc<GlobalLoadingService>) -> Self {
        Self {
            cfg,
            state: Arc::new(CounterState {
                count: Mutex::new(0),
                loading,
            }),
        }
    }
}

#[async_trait]
impl Interceptor for LoadingInterceptor {
    async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response> {
        if !self.cfg.config()?.global_loading || req.bypass() {
            return next.run(req).await;
        }

        {
            let mut count = self.state.count.lock().unwrap();
            *count += 1;
            if *count == 1 {
                self.state.loading.set(true);
            }
        }
        let _guard = InFlightGuard {
            state: self.state.clone(),
        };

        next.run(req).await
    }
}
