pub mod cors;
pub mod handlers;
pub mod server;

use pkg_discovery::DiscoveryLoop;
use pkg_mesh::MeshManager;
use pkg_metrics::MetricsRegistry;
use std::sync::Arc;

/// Gateway-only toggles.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Expose the generated mesh configuration over the API.
    pub introspection: bool,
    /// Answer with permissive CORS headers.
    pub cors: bool,
}

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub discovery_loop: DiscoveryLoop,
    pub mesh: Arc<MeshManager>,
    pub metrics: Arc<MetricsRegistry>,
    pub settings: Arc<GatewaySettings>,
}
