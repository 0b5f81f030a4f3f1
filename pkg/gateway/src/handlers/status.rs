use axum::{Json, extract::State, response::IntoResponse};
use pkg_types::status::GatewayStatus;

use crate::AppState;

/// GET /metrics — Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render()
}

/// GET /api/v1/status — loop, mesh, and metric state in one view.
pub async fn gateway_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = GatewayStatus {
        discovery: state.discovery_loop.status(),
        mesh: state.mesh.stats(),
        store: state.mesh.store_description(),
        metrics: state.metrics.snapshot(),
    };
    Json(status)
}
