use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::AppState;
use crate::cors::cors_middleware;
use crate::handlers::{discovery, health, mesh, services, status};

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    let cors_enabled = state.settings.cors;
    let app = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(status::metrics))
        .route("/api/v1/status", get(status::gateway_status))
        .route("/api/v1/services", get(services::list_services))
        .route("/api/v1/mesh/config", get(mesh::mesh_config))
        .route("/api/v1/discovery/refresh", post(discovery::refresh))
        .route("/api/v1/discovery/config", put(discovery::update_config))
        .with_state(state);

    if cors_enabled {
        app.layer(middleware::from_fn(cors_middleware))
    } else {
        app
    }
}

/// Serve the gateway until ctrl-c. The caller owns the discovery loop's
/// lifecycle and stops it after this returns.
pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    info!("Starting gateway server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewaySettings;
    use pkg_discovery::{DiscoveryLoop, ServiceDiscovery};
    use pkg_kube::HttpKubeClient;
    use pkg_mesh::{FileConfigStore, MeshManager};
    use pkg_metrics::MetricsRegistry;
    use pkg_types::config::DiscoveryOptions;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_DIR_SEQ: AtomicU32 = AtomicU32::new(0);

    /// Wire real components against a dead API server; the loop stays
    /// stopped so no outbound call is ever made.
    async fn spawn_gateway(introspection: bool) -> (String, AppState) {
        let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        let config_path = std::env::temp_dir()
            .join(format!("meshgate-gateway-test-{}-{}", std::process::id(), seq))
            .join("mesh-config.json");

        let kube = Arc::new(HttpKubeClient::new("http://127.0.0.1:9", None).unwrap());
        let discovery = ServiceDiscovery::new(kube, None).unwrap();
        let mesh = Arc::new(MeshManager::new(Arc::new(FileConfigStore::new(config_path))).await);
        let metrics = Arc::new(MetricsRegistry::for_discovery());
        let discovery_loop = DiscoveryLoop::new(
            discovery,
            mesh.clone(),
            metrics.clone(),
            DiscoveryOptions::default(),
        )
        .unwrap();

        let state = AppState {
            discovery_loop,
            mesh,
            metrics,
            settings: Arc::new(GatewaySettings {
                introspection,
                cors: false,
            }),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    #[tokio::test]
    async fn test_health_and_readiness_endpoints() {
        let (base, state) = spawn_gateway(true).await;
        let client = reqwest::Client::new();

        let resp = client.get(format!("{}/healthz", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);

        // Not ready before the first configuration write.
        let resp = client.get(format!("{}/readyz", base)).send().await.unwrap();
        assert_eq!(resp.status(), 503);

        // A persisted configuration flips readiness.
        state.mesh.update_configuration(&[]).await.unwrap();
        let resp = client.get(format!("{}/readyz", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_metrics_and_status_endpoints() {
        let (base, _state) = spawn_gateway(true).await;
        let client = reqwest::Client::new();

        let text = client
            .get(format!("{}/metrics", base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(text.contains("meshgate_discovery_ticks_total"));

        let status: pkg_types::status::GatewayStatus = client
            .get(format!("{}/api/v1/status", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status.discovery.phase, pkg_types::status::LoopPhase::Stopped);
        assert!(!status.mesh.has_config);
        assert!(status.store.starts_with("file:"));
    }

    #[tokio::test]
    async fn test_mesh_config_endpoint_respects_introspection_toggle() {
        let (base, _state) = spawn_gateway(false).await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{}/api/v1/mesh/config", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.text().await.unwrap(), "introspection disabled");
    }

    #[tokio::test]
    async fn test_refresh_conflicts_while_stopped() {
        let (base, _state) = spawn_gateway(true).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/v1/discovery/refresh", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
    }

    #[tokio::test]
    async fn test_update_config_rejects_bad_interval() {
        let (base, state) = spawn_gateway(true).await;
        let client = reqwest::Client::new();

        let resp = client
            .put(format!("{}/api/v1/discovery/config", base))
            .json(&serde_json::json!({ "interval": "bad" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .put(format!("{}/api/v1/discovery/config", base))
            .json(&serde_json::json!({ "interval": "30s", "selector_labels": "team=x" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let options = state.discovery_loop.options();
        assert_eq!(options.interval, std::time::Duration::from_secs(30));
        assert_eq!(options.selector, "team=x");
    }
}
