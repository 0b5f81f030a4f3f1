use anyhow::{Context, bail};
use async_trait::async_trait;
use pkg_constants::network::KUBE_LIST_TIMEOUT_SECS;
use pkg_constants::paths::SERVICE_ACCOUNT_TOKEN;
use pkg_types::kube::{KnativeService, KubeList, KubeService};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Typed view of the Kubernetes list/write operations the gateway needs.
///
/// Discovery logic is written against this trait so the transport (REST
/// client here, fakes in tests) can be swapped without touching it.
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// List plain Services, optionally scoped to a namespace.
    async fn list_services(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> anyhow::Result<Vec<KubeService>>;

    /// List Knative Services, optionally scoped to a namespace.
    async fn list_knative_services(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> anyhow::Result<Vec<KnativeService>>;

    /// Read a ConfigMap's `data`, or `None` if it does not exist.
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<BTreeMap<String, String>>>;

    /// Create or replace a ConfigMap with the given `data`.
    async fn put_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> anyhow::Result<()>;
}

/// REST client against the Kubernetes API server.
pub struct HttpKubeClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpKubeClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(KUBE_LIST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true) // self-signed cluster CAs
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    /// Build a client from the in-cluster environment: the well-known
    /// `KUBERNETES_SERVICE_*` variables plus the mounted service-account
    /// token.
    pub fn in_cluster() -> anyhow::Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .context("KUBERNETES_SERVICE_HOST not set; not running in a cluster?")?;
        let port =
            std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
        let token = std::fs::read_to_string(SERVICE_ACCOUNT_TOKEN)
            .ok()
            .map(|t| t.trim().to_string());
        if token.is_none() {
            info!("No service account token found; talking to the API server anonymously");
        }
        Self::new(&format!("https://{}:{}", host, port), token)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        label_selector: &str,
    ) -> anyhow::Result<Vec<T>> {
        debug!("Listing {} (selector={})", path, label_selector);
        let resp = self
            .get(path)
            .query(&[("labelSelector", label_selector)])
            .send()
            .await
            .with_context(|| format!("Kubernetes list call failed: {}", path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Kubernetes API returned {} for {}: {}", status, path, body);
        }

        let list: KubeList<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to decode list response from {}", path))?;
        Ok(list.items)
    }
}

/// Path of the plain-Service list endpoint for the given scope.
pub fn services_path(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("/api/v1/namespaces/{}/services", ns),
        None => "/api/v1/services".to_string(),
    }
}

/// Path of the Knative-Service list endpoint for the given scope.
pub fn knative_services_path(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("/apis/serving.knative.dev/v1/namespaces/{}/services", ns),
        None => "/apis/serving.knative.dev/v1/services".to_string(),
    }
}

fn config_map_path(namespace: &str, name: &str) -> String {
    format!("/api/v1/namespaces/{}/configmaps/{}", namespace, name)
}

#[async_trait]
impl KubeClient for HttpKubeClient {
    async fn list_services(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> anyhow::Result<Vec<KubeService>> {
        self.list(&services_path(namespace), label_selector).await
    }

    async fn list_knative_services(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> anyhow::Result<Vec<KnativeService>> {
        self.list(&knative_services_path(namespace), label_selector)
            .await
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<BTreeMap<String, String>>> {
        let resp = self
            .get(&config_map_path(namespace, name))
            .send()
            .await
            .context("Kubernetes ConfigMap read failed")?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            bail!("Kubernetes API returned {} reading ConfigMap {}", status, name);
        }

        let body: serde_json::Value = resp.json().await?;
        let data = body
            .get("data")
            .and_then(|d| serde_json::from_value(d.clone()).ok())
            .unwrap_or_default();
        Ok(Some(data))
    }

    async fn put_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        let manifest = config_map_manifest(namespace, name, &data);
        let url = format!("{}{}", self.base_url, config_map_path(namespace, name));

        let mut req = self.http.put(&url).json(&manifest);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        let resp = req.send().await.context("Kubernetes ConfigMap write failed")?;

        // Replace requires the object to exist; fall back to create.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            let url = format!(
                "{}/api/v1/namespaces/{}/configmaps",
                self.base_url, namespace
            );
            let mut req = self.http.post(&url).json(&manifest);
            if let Some(token) = &self.token {
                req = req.header("Authorization", format!("Bearer {}", token));
            }
            let resp = req.send().await.context("Kubernetes ConfigMap create failed")?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!("Failed to create ConfigMap {}: {} - {}", name, status, body);
            }
            return Ok(());
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Failed to update ConfigMap {}: {} - {}", name, status, body);
        }
        Ok(())
    }
}

fn config_map_manifest(
    namespace: &str,
    name: &str,
    data: &BTreeMap<String, String>,
) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "name": name, "namespace": namespace },
        "data": data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, routing::get};
    use std::collections::HashMap;

    #[test]
    fn test_list_paths_respect_namespace_scope() {
        assert_eq!(services_path(None), "/api/v1/services");
        assert_eq!(
            services_path(Some("shop")),
            "/api/v1/namespaces/shop/services"
        );
        assert_eq!(
            knative_services_path(None),
            "/apis/serving.knative.dev/v1/services"
        );
        assert_eq!(
            knative_services_path(Some("shop")),
            "/apis/serving.knative.dev/v1/namespaces/shop/services"
        );
    }

    #[test]
    fn test_config_map_manifest_shape() {
        let mut data = BTreeMap::new();
        data.insert("mesh-config.json".to_string(), "{}".to_string());
        let manifest = config_map_manifest("meshgate", "mesh-config", &data);
        assert_eq!(manifest["kind"], "ConfigMap");
        assert_eq!(manifest["metadata"]["name"], "mesh-config");
        assert_eq!(manifest["data"]["mesh-config.json"], "{}");
    }

    /// Serve a canned ServiceList and make sure the client forwards the
    /// label selector and decodes the items.
    #[tokio::test]
    async fn test_list_services_forwards_selector() {
        let app = Router::new().route(
            "/api/v1/namespaces/shop/services",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(
                    params.get("labelSelector").map(String::as_str),
                    Some("team=payments")
                );
                Json(serde_json::json!({
                    "items": [
                        {
                            "metadata": { "name": "orders", "namespace": "shop" },
                            "spec": { "ports": [ { "name": "http", "port": 8080 } ] }
                        }
                    ]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = HttpKubeClient::new(&format!("http://{}", addr), None).unwrap();
        let services = client
            .list_services(Some("shop"), "team=payments")
            .await
            .unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].metadata.name, "orders");
    }
}
