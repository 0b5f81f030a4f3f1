use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use pkg_types::config::parse_interval;
use pkg_types::status::{DiscoveryConfigUpdate, RefreshResponse};
use serde_json::json;
use tracing::error;

use crate::AppState;

/// POST /api/v1/discovery/refresh — run a discovery tick right now.
pub async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    if !state.discovery_loop.is_running() {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "discovery loop is not running" })),
        )
            .into_response();
    }

    match state.discovery_loop.force_discovery().await {
        Ok(changed) => (StatusCode::OK, Json(RefreshResponse { changed })).into_response(),
        Err(e) => {
            error!("Forced discovery failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// PUT /api/v1/discovery/config — live reconfiguration. Interval strings
/// are validated here; bad values never reach the running loop.
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<DiscoveryConfigUpdate>,
) -> impl IntoResponse {
    let mut options = state.discovery_loop.options();

    if let Some(interval) = &update.interval {
        match parse_interval(interval) {
            Ok(d) => options.interval = d,
            Err(e) => return bad_request(e),
        }
    }
    if let Some(retry_delay) = &update.retry_delay {
        match parse_interval(retry_delay) {
            Ok(d) => options.retry_delay = d,
            Err(e) => return bad_request(e),
        }
    }
    if let Some(selector) = update.selector_labels {
        options.selector = selector;
    }
    if let Some(max_retries) = update.max_retries {
        options.max_retries = max_retries;
    }

    match state.discovery_loop.update_config(options) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => bad_request(e),
    }
}

fn bad_request(e: anyhow::Error) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}
