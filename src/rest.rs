// Typed REST resource client over configured API modules
//
// A resource binds an entity type to one module of the config's apiModules
// list; the module's base URL and path resolve lazily per call, so a
// resource built before the config loads starts working once it does.

use crate::config::AppConfigStore;
use crate::error::{CoreError, Result};
use crate::http::client::CoreClient;
use crate::http::Request;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use url::Url;

/// CRUD client for one entity type exposed by a configured API module
pub struct Resource<T> {
    client: CoreClient,
    cfg: Arc<AppConfigStore>,
    module: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Resource<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(client: CoreClient, cfg: Arc<AppConfigStore>, module: impl Into<String>) -> Self {
        Self {
            client,
            cfg,
            module: module.into(),
            _entity: PhantomData,
        }
    }

    /// Module base joined with its path, slashes normalized
    ///
    /// # Errors
    ///
    /// Fails when the module name matches nothing in the config
    /// (case-insensitive) or the configured URL does not parse.
    fn collection_url(&self) -> Result<Url> {
        let cfg = self.cfg.config()?;
        let module = cfg
            .api_modules
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(&self.module))
            .ok_or_else(|| {
                CoreError::Config(format!(
                    "Module '{}' does not exist in the configuration file",
                    self.module
                ))
            })?;

        let joined = format!(
            "{}/{}",
            module.base_url.trim_end_matches('/'),
            module.path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| CoreError::Config(format!("Invalid URL '{joined}': {e}")))
    }

    /// URL for one entity; the id lands percent-encoded in its own segment
    fn item_url(&self, id: &str) -> Result<Url> {
        let mut url = self.collection_url()?;
        let url_display = url.to_string();
        url.path_segments_mut()
            .map_err(|_| CoreError::Config(format!("URL '{}' cannot take segments", url_display)))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    /// Fetches the collection; None and empty query values are skipped
    pub async fn list(&self, query: &[(&str, Option<&str>)]) -> Result<Vec<T>> {
        let mut url = self.collection_url()?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                match value {
                    Some(v) if !v.is_empty() => {
                        pairs.append_pair(key, v);
                    }
                    _ => {}
                }
            }
        }
        // An empty query leaves a bare '?' behind otherwise
        if url.query() == Some("") {
            url.set_query(None);
        }
        self.client.execute(Request::get(url)).await?.json()
    }

    /// Fetches one entity by id
    pub async fn get_by(&self, id: &str) -> Result<T> {
        let url = self.item_url(id)?;
        self.client.execute(Request::get(url)).await?.json()
    }

    /// Creates an entity, returning the server's representation
    pub async fn create(&self, item: &T) -> Result<T> {
        let url = self.collection_url()?;
        let body = serde_json::to_value(item)?;
        self.client.execute(Request::post(url, body)).await?.json()
    }

    /// Replaces an entity by id
    pub async fn update(&self, id: &str, item: &T) -> Result<T> {
        let url = self.item_url(id)?;
        let body = serde_json::to_value(item)?;
        self.client.execute(Request::put(url, body)).await?.json()
    }

    /// Partially updates an entity by id with an arbitrary JSON patch
    pub async fn patch(&self, id: &str, body: serde_json::Value) -> Result<T> {
        let url = self.item_url(id)?;
        self.client.execute(Request::patch(url, body)).await?.json()
    }

    /// Deletes an entity by id
    pub async fn delete(&self, id: &str) -> Result<()> {
        let url = self.item_url(id)?;
        self.client.execute(Request::delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiModule, AppConfig};
    use crate::http::testing::ScriptedHandler;
    use crate::http::Response;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u32,
        name: String,
    }

    fn store() -> Arc<AppConfigStore> {
        Arc::new(AppConfigStore::with_config(AppConfig {
            app_name: "rest-test".to_string(),
            api_modules: vec![ApiModule {
                name: "Users".to_string(),
                base_url: "https://api.example.com/".to_string(),
                path: "/v1/users".to_string(),
            }],
            ..Default::default()
        }))
    }

    fn resource(
        script: impl Fn(usize, &Request) -> Result<Response> + Send + Sync + 'static,
    ) -> (Resource<User>, Arc<ScriptedHandler>) {
        let cfg = store();
        let terminal = Arc::new(ScriptedHandler::new(script));
        let client = CoreClient::new(Vec::new(), terminal.clone());
        (Resource::new(client, cfg, "users"), terminal)
    }

    #[tokio::test]
    async fn test_list_builds_url_and_skips_empty_params() {
        let (res, _) = resource(|_, req| {
            assert_eq!(
                req.url(),
                "https://api.example.com/v1/users?name=ada&active=true"
            );
            Ok(Response::new(200, "OK", req.url()).with_json_body(&vec![User {
                id: 1,
                name: "ada".to_string(),
            }]))
        });

        let users = res
            .list(&[
                ("name", Some("ada")),
                ("age", None),
                ("city", Some("")),
                ("active", Some("true")),
            ])
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_list_without_params_has_no_query() {
        let (res, _) = resource(|_, req| {
            assert_eq!(req.url(), "https://api.example.com/v1/users");
            Ok(Response::new(200, "OK", req.url()).with_json_body(&Vec::<User>::new()))
        });
        assert!(res.list(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_percent_encodes_id() {
        let (res, _) = resource(|_, req| {
            assert_eq!(req.url(), "https://api.example.com/v1/users/a%20b%2Fc");
            Ok(Response::new(200, "OK", req.url()).with_json_body(&User {
                id: 7,
                name: "odd".to_string(),
            }))
        });
        assert_eq!(res.get_by("a b/c").await.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_create_update_patch_delete_verbs_and_bodies() {
        let (res, terminal) = resource(|n, req| {
            let echo = User {
                id: 9,
                name: "eve".to_string(),
            };
            match n {
                0 => {
                    assert_eq!(req.method(), &reqwest::Method::POST);
                    assert_eq!(req.body().unwrap()["name"], "eve");
                }
                1 => {
                    assert_eq!(req.method(), &reqwest::Method::PUT);
                    assert!(req.url().ends_with("/users/9"));
                }
                2 => {
                    assert_eq!(req.method(), &reqwest::Method::PATCH);
                    assert_eq!(req.body().unwrap()["name"], "newname");
                }
                _ => {
                    assert_eq!(req.method(), &reqwest::Method::DELETE);
                    return Ok(Response::new(204, "No Content", req.url()));
                }
            }
            Ok(Response::new(200, "OK", req.url()).with_json_body(&echo))
        });

        let eve = User {
            id: 9,
            name: "eve".to_string(),
        };
        res.create(&eve).await.unwrap();
        res.update("9", &eve).await.unwrap();
        res.patch("9", serde_json::json!({"name": "newname"}))
            .await
            .unwrap();
        res.delete("9").await.unwrap();
        assert_eq!(terminal.call_count(), 4);
    }

    #[tokio::test]
    async fn test_unknown_module_fails_with_config_error() {
        let cfg = store();
        let client = CoreClient::new(Vec::new(), Arc::new(ScriptedHandler::ok()));
        let res: Resource<User> = Resource::new(client, cfg, "orders");

        let err = res.get_by("1").await.unwrap_err();
        assert!(err
            .to_string()
            .contains("'orders' does not exist in the configuration file"));
    }
}
