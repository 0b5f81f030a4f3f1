use axum::{Json, extract::State, response::IntoResponse};
use tracing::debug;

use crate::AppState;

/// GET /api/v1/services — endpoints seen by the most recent discovery tick.
pub async fn list_services(State(state): State<AppState>) -> impl IntoResponse {
    let endpoints = state.discovery_loop.last_endpoints();
    debug!("Serving {} discovered services", endpoints.len());
    Json(endpoints)
}
