// Pipeline-aware HTTP client

use crate::error::Result;
use crate::http::{Handler, Interceptor, Next, Request, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// HTTP client that routes every request through the interceptor chain
///
/// The chain order is fixed at construction; the terminal handler actually
/// performs the I/O. Cloning is cheap and clones share the chain.
#[derive(Clone)]
pub struct CoreClient {
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
    terminal: Arc<dyn Handler>,
}

impl CoreClient {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>, terminal: Arc<dyn Handler>) -> Self {
        Self {
            interceptors: Arc::new(interceptors),
            terminal,
        }
    }

    /// Runs a request through the full chain
    pub async fn execute(&self, req: Request) -> Result<Response> {
        Next::new(&self.interceptors, self.terminal.as_ref())
            .run(req)
            .await
    }

    /// GET returning the deserialized JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: impl Into<String>) -> Result<T> {
        self.execute(Request::get(url)).await?.json()
    }

    /// POST returning the deserialized JSON body
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<T> {
        self.execute(Request::post(url, body)).await?.json()
    }

    /// The terminal handler, for reporters that must skip the chain
    pub fn transport(&self) -> Arc<dyn Handler> {
        self.terminal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedHandler;
    use async_trait::async_trait;
    use reqwest::header::{HeaderName, HeaderValue};

    struct Stamp;

    #[async_trait]
    impl Interceptor for Stamp {
        async fn intercept(&self, req: Request, next: Next<'_>) -> Result<Response> {
            next.run(req.with_header(
                HeaderName::from_static("x-stamp"),
                HeaderValue::from_static("yes"),
            ))
            .await
        }
    }

    #[tokio::test]
    async fn test_execute_runs_the_chain() {
        let stamped = Arc::new(std::sync::Mutex::new(false));
        let stamped_clone = stamped.clone();
        let terminal = Arc::new(ScriptedHandler::new(move |_, req| {
            *stamped_clone.lock().unwrap() = req.headers().contains_key("x-stamp");
            Ok(Response::new(200, "OK", req.url()).with_json_body(&serde_json::json!({"n": 1})))
        }));
        let client = CoreClient::new(vec![Arc::new(Stamp)], terminal);

        let value: serde_json::Value = client
            .get_json("https://api.example.com/items")
            .await
            .unwrap();
        assert_eq!(value["n"], 1);
        assert!(*stamped.lock().unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_chain_and_terminal() {
        let terminal = Arc::new(ScriptedHandler::ok());
        let client = CoreClient::new(Vec::new(), terminal.clone());
        let other = client.clone();

        client
            .execute(Request::get("https://api.example.com/a"))
            .await
            .unwrap();
        other
            .execute(Request::get("https://api.example.com/b"))
            .await
            .unwrap();
        assert_eq!(terminal.call_count(), 2);
    }
}
