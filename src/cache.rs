// GET response cache with lazy expiry
//
// Design Decision: Lazy-on-read expiry, manual invalidation, no eviction task
//
// Rationale: The cache exists to absorb repeated reads of slow-changing
// resources, not to be a storage engine. Staleness is checked only when an
// entry is next read, which keeps the service to a Mutex'd map with zero
// background work. Writers invalidate explicitly after mutations.
//
// The allow-list is default-deny: an empty cacheableUrls list means nothing
// is cacheable, regardless of the cache.cache gate.

use crate::config::AppConfigStore;
use crate::error::Result;
use crate::http::{Interceptor, Next, Request, Response};
use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

struct Entry {
    res: Response,
    cached_at: Instant,
}

/// In-memory cache of successful GET responses, keyed by full URL + query
///
/// The allow-list check is case-insensitive; the key itself is not folded.
pub struct CacheService {
    cfg: Arc<AppConfigStore>,
    map: Mutex<HashMap<String, Entry>>,
}

impl CacheService {
    pub fn new(cfg: Arc<AppConfigStore>) -> Self {
        Self {
            cfg,
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Cached response for the request, or None on miss/expiry/disabled
    ///
    /// Expired entries are removed on read.
    pub fn get(&self, req: &Request) -> Option<Response> {
        let cfg = self.cfg.config().ok()?;
        if !cfg.cache.cache {
            return None;
        }

        let key = req.url();
        if !allowed(key, &cfg.cache.cacheable_urls) {
            return None;
        }

        let mut map = self.map.lock().unwrap();
        let expired = map
            .get(key)
            .map(|e| e.cached_at.elapsed().as_millis() as i64 > cfg.cache.max_age)?;
        if expired {
            map.remove(key);
            return None;
        }
        map.get(key).map(|e| e.res.clone())
    }

    /// Stores a successful response under the request's full URL
    pub fn put(&self, req: &Request, res: &Response) {
        let Ok(cfg) = self.cfg.config() else { return };
        if !cfg.cache.cache {
            return;
        }

        let key = req.url();
        if !allowed(key, &cfg.cache.cacheable_urls) {
            return;
        }

        self.map.lock().unwrap().insert(
            key.to_string(),
            Entry {
                res: res.clone(),
                cached_at: Instant::now(),
            },
        );
    }

    /// Drops the entry for one exact URL (query string included)
    pub fn invalidate_url(&self, url_with_params: &str) {
        self.map.lock().unwrap().remove(url_with_params);
    }

    /// Drops every entry whose stored key starts with the prefix
    pub fn invalidate_by_prefix(&self, prefix: &str) {
        self.map
            .lock()
            .unwrap()
            .retain(|k, _| !k.starts_with(prefix));
    }

    /// Drops all entries
    pub fn clear(&self) {
        self.map.lock().unwrap().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }
}

/// Empty allow-list means no caching
fn allowed(url_with_params: &str, allow: &[String]) -> bool {
    if allow.is_empty() {
        return false;
    }
    let u = url_with_params.to_lowercase();
    allow.iter().any(|token| u.contains(&token.to_lowercase()))
}

/// Interceptor serving cacheable GETs from the cache
///
/// Cache hits short-circuit the chain entirely; misses store the downstream
/// response before passing it through unmodified.
pub struct CacheInterceptor {
    cfg: Arc<AppConfigStore>,
    store: Arc<CacheService>,
}

impl CacheInterceptor {
    pub fn new(cfg: Arc<AppConfigStore>, store: Arc<CacheService>) -> Self {
        Self { cfg, store }
    }
}

#[async_trait]
impl Interceptor for CacheInterceptor {
    async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response> {
        if req.method() != Method::GET {
            return next.run(req).await;
        }

        let cache_cfg = &self.cfg.config()?.cache;
        if !cache_cfg.cache || !allowed(req.url(), &cache_cfg.cacheable_urls) {
            return next.run(req).await;
        }

        if let Some(hit) = self.store.get(&req) {
            return Ok(hit);
        }

        let res = next.run(req.clone()).await?;
        self.store.put(&req, &res);
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, CacheConfig};
    use crate::http::testing::ScriptedHandler;
    use std::time::Duration;

    fn store_with(cache: CacheConfig) -> Arc<AppConfigStore> {
        Arc::new(AppConfigStore::with_config(AppConfig {
            app_name: "cache-test".to_string(),
            cache,
            ..Default::default()
        }))
    }

    fn enabled_cfg(max_age: i64) -> Arc<AppConfigStore> {
        store_with(CacheConfig {
            cache: true,
            max_age,
            cacheable_urls: vec!["/catalog".to_string()],
        })
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let cfg = enabled_cfg(60_000);
        let store = Arc::new(CacheService::new(cfg.clone()));
        let terminal = ScriptedHandler::ok();
        let chain: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(CacheInterceptor::new(cfg, store.clone()))];

        let req = Request::get("https://api.example.com/catalog?page=1");
        let first = Next::new(&chain, &terminal).run(req.clone()).await.unwrap();
        let second = Next::new(&chain, &terminal).run(req).await.unwrap();

        assert_eq!(terminal.call_count(), 1);
        assert_eq!(first.status(), second.status());
        assert_eq!(first.url(), second.url());
    }

    #[tokio::test]
    async fn test_non_allowlisted_url_never_touches_cache() {
        let cfg = enabled_cfg(60_000);
        let store = Arc::new(CacheService::new(cfg.clone()));
        let terminal = ScriptedHandler::ok();
        let chain: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(CacheInterceptor::new(cfg, store.clone()))];

        let req = Request::get("https://api.example.com/profile");
        Next::new(&chain, &terminal).run(req.clone()).await.unwrap();
        Next::new(&chain, &terminal).run(req).await.unwrap();

        assert_eq!(terminal.call_count(), 2);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_empty_allowlist_is_default_deny() {
        let cfg = store_with(CacheConfig {
            cache: true,
            max_age: 60_000,
            cacheable_urls: vec![],
        });
        let store = Arc::new(CacheService::new(cfg.clone()));
        let terminal = ScriptedHandler::ok();
        let chain: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(CacheInterceptor::new(cfg, store.clone()))];

        let req = Request::get("https://api.example.com/catalog");
        Next::new(&chain, &terminal).run(req.clone()).await.unwrap();
        Next::new(&chain, &terminal).run(req).await.unwrap();

        assert_eq!(terminal.call_count(), 2);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_post_is_never_cached() {
        let cfg = enabled_cfg(60_000);
        let store = Arc::new(CacheService::new(cfg.clone()));
        let terminal = ScriptedHandler::ok();
        let chain: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(CacheInterceptor::new(cfg, store.clone()))];

        let req = Request::post(
            "https://api.example.com/catalog",
            serde_json::json!({"name": "x"}),
        );
        Next::new(&chain, &terminal).run(req.clone()).await.unwrap();
        Next::new(&chain, &terminal).run(req).await.unwrap();

        assert_eq!(terminal.call_count(), 2);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let cfg = enabled_cfg(1);
        let store = Arc::new(CacheService::new(cfg.clone()));
        let terminal = ScriptedHandler::ok();
        let chain: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(CacheInterceptor::new(cfg, store.clone()))];

        let req = Request::get("https://api.example.com/catalog");
        Next::new(&chain, &terminal).run(req.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        Next::new(&chain, &terminal).run(req).await.unwrap();

        assert_eq!(terminal.call_count(), 2);
    }

    #[tokio::test]
    async fn test_case_insensitive_allowlist_match() {
        let cfg = store_with(CacheConfig {
            cache: true,
            max_age: 60_000,
            cacheable_urls: vec!["/Catalog".to_string()],
        });
        let store = Arc::new(CacheService::new(cfg.clone()));
        let terminal = ScriptedHandler::ok();
        let chain: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(CacheInterceptor::new(cfg, store.clone()))];

        let req = Request::get("https://api.example.com/CATALOG?q=1");
        Next::new(&chain, &terminal).run(req.clone()).await.unwrap();
        Next::new(&chain, &terminal).run(req).await.unwrap();

        assert_eq!(terminal.call_count(), 1);
    }

    #[test]
    fn test_invalidate_by_prefix_is_exact_prefix() {
        let cfg = store_with(CacheConfig {
            cache: true,
            max_age: 60_000,
            cacheable_urls: vec!["example.com".to_string()],
        });
        let store = CacheService::new(cfg);

        for url in [
            "https://api.example.com/users/1",
            "https://api.example.com/users/2",
            "https://api.example.com/items/1",
        ] {
            let req = Request::get(url);
            store.put(&req, &Response::new(200, "OK", url));
        }
        assert_eq!(store.len(), 3);

        store.invalidate_by_prefix("https://api.example.com/users");
        assert_eq!(store.len(), 1);
        assert!(store
            .get(&Request::get("https://api.example.com/items/1"))
            .is_some());

        store.invalidate_url("https://api.example.com/items/1");
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_clear_drops_everything() {
        let cfg = store_with(CacheConfig {
            cache: true,
            max_age: 60_000,
            cacheable_urls: vec!["example.com".to_string()],
        });
        let store = CacheService::new(cfg);
        let req = Request::get("https://api.example.com/a");
        store.put(&req, &Response::new(200, "OK", "https://api.example.com/a"));
        store.clear();
        assert_eq!(store.len(), 0);
    }
}
