use crate::probe::{self, ProbeOutcome};
use anyhow::bail;
use pkg_constants::network::{CLUSTER_DNS_SUFFIX, PROBE_TIMEOUT_SECS, PROBE_USER_AGENT};
use pkg_kube::KubeClient;
use pkg_types::endpoint::ServiceEndpoint;
use pkg_types::kube::KubeServicePort;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces an authoritative snapshot of candidate backend services and
/// determines, per service, whether it exposes a machine-readable API
/// description.
pub struct ServiceDiscovery {
    kube: Arc<dyn KubeClient>,
    http: reqwest::Client,
    namespace: Option<String>,
}

impl ServiceDiscovery {
    /// `namespace: None` discovers across all namespaces.
    pub fn new(kube: Arc<dyn KubeClient>, namespace: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(PROBE_USER_AGENT)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            kube,
            http,
            namespace,
        })
    }

    /// List Knative services matching the selector.
    ///
    /// Only services with a resolvable `status.url` are reported; their
    /// internal address is always `http://{name}.{namespace}.svc.cluster.local`
    /// (default port 80). Readiness comes from the `Ready` condition.
    pub async fn discover_knative_services(
        &self,
        selector: &str,
    ) -> anyhow::Result<Vec<ServiceEndpoint>> {
        let items = self
            .kube
            .list_knative_services(self.namespace.as_deref(), selector)
            .await?;

        let mut endpoints = Vec::new();
        for svc in items {
            let name = svc.metadata.name;
            let namespace = svc.metadata.namespace;
            let Some(url) = svc.status.url.clone().filter(|u| !u.is_empty()) else {
                debug!("Skipping Knative service {}/{} with no url yet", namespace, name);
                continue;
            };
            endpoints.push(ServiceEndpoint {
                internal_url: format!("http://{}.{}.{}", name, namespace, CLUSTER_DNS_SUFFIX),
                url,
                ready: svc.status.is_ready(),
                labels: svc.metadata.labels,
                annotations: svc.metadata.annotations,
                name,
                namespace,
                has_openapi: false,
                openapi_spec: None,
                openapi_url: None,
                error: None,
            });
        }
        Ok(endpoints)
    }

    /// List plain services matching the selector.
    ///
    /// The probed port is the first one named `http`/`http-web` or numbered
    /// `80`/`8080`, else the first declared port. Services without ports
    /// are skipped.
    pub async fn discover_regular_services(
        &self,
        selector: &str,
    ) -> anyhow::Result<Vec<ServiceEndpoint>> {
        let items = self
            .kube
            .list_services(self.namespace.as_deref(), selector)
            .await?;

        let mut endpoints = Vec::new();
        for svc in items {
            let name = svc.metadata.name;
            let namespace = svc.metadata.namespace;
            let Some(port) = select_port(&svc.spec.ports) else {
                debug!("Skipping service {}/{} with no ports", namespace, name);
                continue;
            };
            endpoints.push(ServiceEndpoint {
                internal_url: format!(
                    "http://{}.{}.{}:{}",
                    name, namespace, CLUSTER_DNS_SUFFIX, port
                ),
                url: String::new(),
                // Plain Services carry no status conditions.
                ready: true,
                labels: svc.metadata.labels,
                annotations: svc.metadata.annotations,
                name,
                namespace,
                has_openapi: false,
                openapi_spec: None,
                openapi_url: None,
                error: None,
            });
        }
        Ok(endpoints)
    }

    /// Run both discovery sources concurrently and concatenate the results.
    ///
    /// One source failing (Knative CRDs not installed, RBAC gaps) degrades
    /// to an empty contribution from that source; both failing is a
    /// tick-level error. Results are not deduplicated: a Knative service's
    /// backing Service may legitimately appear twice.
    pub async fn discover_all_services(
        &self,
        selector: &str,
    ) -> anyhow::Result<Vec<ServiceEndpoint>> {
        let (knative, regular) = tokio::join!(
            self.discover_knative_services(selector),
            self.discover_regular_services(selector)
        );

        if let (Err(ke), Err(re)) = (&knative, &regular) {
            bail!(
                "service discovery failed for both sources: knative: {}; services: {}",
                ke,
                re
            );
        }

        let mut endpoints = knative.unwrap_or_else(|e| {
            warn!("Knative discovery failed, continuing with plain services: {}", e);
            Vec::new()
        });
        endpoints.extend(regular.unwrap_or_else(|e| {
            warn!("Service discovery failed, continuing with Knative services: {}", e);
            Vec::new()
        }));
        Ok(endpoints)
    }

    /// Probe every service for an OpenAPI/Swagger document.
    ///
    /// Probing is strictly sequential — per service and per candidate path —
    /// to bound the load on backends and honor the override-path-first
    /// precedence. Individual probe failures never abort the batch.
    pub async fn probe_openapi_endpoints(
        &self,
        mut services: Vec<ServiceEndpoint>,
    ) -> Vec<ServiceEndpoint> {
        for service in &mut services {
            match probe::find_openapi_spec(&self.http, service).await {
                ProbeOutcome::Found { path, spec } => {
                    info!(
                        "Found {} spec for {}/{} at {}",
                        spec.version(),
                        service.namespace,
                        service.name,
                        path
                    );
                    service.has_openapi = true;
                    service.openapi_url = Some(path);
                    service.openapi_spec = Some(spec);
                }
                ProbeOutcome::NoSpec => {
                    debug!(
                        "No OpenAPI spec found for {}/{}",
                        service.namespace, service.name
                    );
                }
                ProbeOutcome::Unreachable { error } => {
                    warn!(
                        "All probe paths failed for {}/{}: {}",
                        service.namespace, service.name, error
                    );
                    service.error = Some(error);
                }
            }
        }
        services
    }
}

/// First port named `http`/`http-web` or numbered `80`/`8080`, else the
/// first declared port. `None` when the service declares no ports.
fn select_port(ports: &[KubeServicePort]) -> Option<u16> {
    let preferred = ports.iter().find(|p| {
        matches!(p.name.as_deref(), Some("http") | Some("http-web"))
            || p.port == 80
            || p.port == 8080
    });
    preferred.or_else(|| ports.first()).map(|p| p.port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pkg_types::kube::{
        KnativeCondition, KnativeService, KnativeServiceStatus, KubeService, KubeServiceSpec,
        ObjectMeta,
    };
    use std::collections::BTreeMap;

    fn port(name: Option<&str>, number: u16) -> KubeServicePort {
        KubeServicePort {
            name: name.map(str::to_string),
            port: number,
        }
    }

    #[test]
    fn test_select_port_precedence() {
        assert_eq!(select_port(&[]), None);
        assert_eq!(
            select_port(&[port(Some("grpc"), 9090), port(Some("http"), 8000)]),
            Some(8000)
        );
        assert_eq!(
            select_port(&[port(Some("grpc"), 9090), port(Some("http-web"), 7000)]),
            Some(7000)
        );
        assert_eq!(
            select_port(&[port(None, 9090), port(None, 8080)]),
            Some(8080)
        );
        assert_eq!(select_port(&[port(None, 9090), port(None, 80)]), Some(80));
        // Nothing preferred: first declared port wins.
        assert_eq!(
            select_port(&[port(Some("grpc"), 9090), port(None, 5432)]),
            Some(9090)
        );
    }

    /// Kube fake with scripted per-source results.
    struct FakeKube {
        knative: anyhow::Result<Vec<KnativeService>>,
        services: anyhow::Result<Vec<KubeService>>,
    }

    impl FakeKube {
        fn new(
            knative: anyhow::Result<Vec<KnativeService>>,
            services: anyhow::Result<Vec<KubeService>>,
        ) -> Arc<Self> {
            Arc::new(Self { knative, services })
        }
    }

    fn clone_result<T: Clone>(r: &anyhow::Result<Vec<T>>) -> anyhow::Result<Vec<T>> {
        match r {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(anyhow::anyhow!("{}", e)),
        }
    }

    #[async_trait]
    impl KubeClient for FakeKube {
        async fn list_services(
            &self,
            _namespace: Option<&str>,
            _label_selector: &str,
        ) -> anyhow::Result<Vec<KubeService>> {
            clone_result(&self.services)
        }

        async fn list_knative_services(
            &self,
            _namespace: Option<&str>,
            _label_selector: &str,
        ) -> anyhow::Result<Vec<KnativeService>> {
            clone_result(&self.knative)
        }

        async fn get_config_map(
            &self,
            _namespace: &str,
            _name: &str,
        ) -> anyhow::Result<Option<BTreeMap<String, String>>> {
            Ok(None)
        }

        async fn put_config_map(
            &self,
            _namespace: &str,
            _name: &str,
            _data: BTreeMap<String, String>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn knative_service(name: &str, url: Option<&str>, ready: bool) -> KnativeService {
        KnativeService {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: "apps".to_string(),
                ..Default::default()
            },
            status: KnativeServiceStatus {
                url: url.map(str::to_string),
                conditions: if ready {
                    vec![KnativeCondition {
                        condition_type: "Ready".to_string(),
                        status: "True".to_string(),
                    }]
                } else {
                    Vec::new()
                },
            },
        }
    }

    fn regular_service(name: &str, ports: Vec<KubeServicePort>) -> KubeService {
        KubeService {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: "apps".to_string(),
                ..Default::default()
            },
            spec: KubeServiceSpec { ports },
        }
    }

    #[tokio::test]
    async fn test_knative_services_without_url_are_excluded() {
        let kube = FakeKube::new(
            Ok(vec![
                knative_service("ready", Some("https://ready.apps.example.com"), true),
                knative_service("pending", None, false),
            ]),
            Ok(Vec::new()),
        );
        let discovery = ServiceDiscovery::new(kube, None).unwrap();

        let endpoints = discovery.discover_knative_services("a=b").await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].name, "ready");
        assert!(endpoints[0].ready);
        assert_eq!(
            endpoints[0].internal_url,
            "http://ready.apps.svc.cluster.local"
        );
    }

    #[tokio::test]
    async fn test_regular_services_resolve_port_into_internal_url() {
        let kube = FakeKube::new(
            Ok(Vec::new()),
            Ok(vec![
                regular_service("orders", vec![port(Some("http"), 8080)]),
                regular_service("portless", Vec::new()),
            ]),
        );
        let discovery = ServiceDiscovery::new(kube, None).unwrap();

        let endpoints = discovery.discover_regular_services("a=b").await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(
            endpoints[0].internal_url,
            "http://orders.apps.svc.cluster.local:8080"
        );
        assert!(endpoints[0].url.is_empty());
        assert!(endpoints[0].ready);
    }

    #[tokio::test]
    async fn test_discover_all_tolerates_one_failing_source() {
        let kube = FakeKube::new(
            Err(anyhow::anyhow!("knative CRDs not installed")),
            Ok(vec![regular_service("orders", vec![port(None, 80)])]),
        );
        let discovery = ServiceDiscovery::new(kube, None).unwrap();

        let endpoints = discovery.discover_all_services("a=b").await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].name, "orders");
    }

    #[tokio::test]
    async fn test_discover_all_fails_when_both_sources_fail() {
        let kube = FakeKube::new(
            Err(anyhow::anyhow!("api down")),
            Err(anyhow::anyhow!("api down")),
        );
        let discovery = ServiceDiscovery::new(kube, None).unwrap();

        assert!(discovery.discover_all_services("a=b").await.is_err());
    }

    #[tokio::test]
    async fn test_probe_marks_exactly_the_services_with_specs() {
        use axum::response::{IntoResponse, Json};
        use axum::routing::any;
        use axum::Router;

        // One backend serves a valid 3.0 document at /openapi.json.
        let with_spec = Router::new().route(
            "/{*path}",
            any(|req: axum::http::Request<axum::body::Body>| async move {
                if req.uri().path() == "/openapi.json" {
                    Json(serde_json::json!({
                        "openapi": "3.0.0",
                        "info": { "title": "orders" },
                        "paths": { "/orders": {} }
                    }))
                    .into_response()
                } else {
                    axum::http::StatusCode::NOT_FOUND.into_response()
                }
            }),
        );
        // The other 404s everywhere.
        let without_spec = Router::new().route(
            "/{*path}",
            any(|| async { axum::http::StatusCode::NOT_FOUND }),
        );

        let mut bases = Vec::new();
        for app in [with_spec, without_spec] {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            bases.push(format!("http://{}", listener.local_addr().unwrap()));
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
        }

        let kube = FakeKube::new(Ok(Vec::new()), Ok(Vec::new()));
        let discovery = ServiceDiscovery::new(kube, None).unwrap();

        let make = |name: &str, base: &str| ServiceEndpoint {
            name: name.to_string(),
            namespace: "apps".to_string(),
            url: String::new(),
            internal_url: base.to_string(),
            ready: true,
            labels: Default::default(),
            annotations: Default::default(),
            has_openapi: false,
            openapi_spec: None,
            openapi_url: None,
            error: None,
        };
        let services = vec![make("orders", &bases[0]), make("audit", &bases[1])];

        let probed = discovery.probe_openapi_endpoints(services).await;
        assert!(probed[0].has_openapi);
        assert_eq!(probed[0].openapi_url.as_deref(), Some("/openapi.json"));
        assert!(probed[0].error.is_none());

        assert!(!probed[1].has_openapi);
        assert!(probed[1].openapi_spec.is_none());
        assert!(probed[1].error.is_none());
    }

    #[tokio::test]
    async fn test_discover_all_concatenates_without_dedup() {
        // The same workload seen through both sources stays duplicated.
        let kube = FakeKube::new(
            Ok(vec![knative_service(
                "orders",
                Some("https://orders.apps.example.com"),
                true,
            )]),
            Ok(vec![regular_service("orders", vec![port(None, 80)])]),
        );
        let discovery = ServiceDiscovery::new(kube, None).unwrap();

        let endpoints = discovery.discover_all_services("a=b").await.unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].name, "orders");
        assert_eq!(endpoints[1].name, "orders");
    }
}
