use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::AppState;

/// GET /api/v1/mesh/config — the currently applied mesh configuration.
/// Gated by the introspection toggle.
pub async fn mesh_config(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings.introspection {
        return (StatusCode::NOT_FOUND, "introspection disabled").into_response();
    }
    match state.mesh.current_config() {
        Some(config) => (StatusCode::OK, Json(config)).into_response(),
        None => (StatusCode::NOT_FOUND, "no mesh configuration generated yet").into_response(),
    }
}
