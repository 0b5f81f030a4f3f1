use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::AppState;

/// GET /healthz — liveness. Always 200 once the server is accepting
/// connections.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /readyz — readiness. 200 once a mesh configuration exists for the
/// mesh runtime to consume, 503 before that.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.mesh.health_status();
    let code = if health.has_config {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}
