use pkg_constants::discovery::OPENAPI_PROBE_PATHS;
use pkg_types::endpoint::ServiceEndpoint;
use pkg_types::openapi::OpenApiDocument;
use tracing::debug;

/// Result of probing one service across all candidate paths.
pub enum ProbeOutcome {
    /// A valid spec was found; later paths were not tried.
    Found { path: String, spec: OpenApiDocument },
    /// At least one path answered cleanly but none served a valid spec.
    /// The expected case for most services, not a failure.
    NoSpec,
    /// Every candidate path failed at the transport layer.
    Unreachable { error: String },
}

/// Candidate paths in probe order: the service's declared override first,
/// then the fixed common list.
pub fn candidate_paths(service: &ServiceEndpoint) -> Vec<String> {
    let mut paths = Vec::with_capacity(OPENAPI_PROBE_PATHS.len() + 1);
    if let Some(declared) = service.openapi_path_override() {
        paths.push(normalize_path(declared));
    }
    paths.extend(OPENAPI_PROBE_PATHS.iter().map(|p| p.to_string()));
    paths
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Try each candidate path in order against the service's internal URL and
/// return on the first valid spec. Transport errors on a path are swallowed
/// and probing continues; they only surface as [`ProbeOutcome::Unreachable`]
/// when no path got a response at all.
pub async fn find_openapi_spec(
    http: &reqwest::Client,
    service: &ServiceEndpoint,
) -> ProbeOutcome {
    let mut attempts = 0usize;
    let mut transport_errors = 0usize;
    let mut last_error = None;

    for path in candidate_paths(service) {
        attempts += 1;
        match try_path(http, &service.internal_url, &path).await {
            Ok(Some(spec)) => return ProbeOutcome::Found { path, spec },
            Ok(None) => {}
            Err(e) => {
                debug!(
                    "Probe {}{} failed: {}",
                    service.internal_url, path, e
                );
                transport_errors += 1;
                last_error = Some(e.to_string());
            }
        }
    }

    if attempts > 0 && transport_errors == attempts {
        ProbeOutcome::Unreachable {
            error: last_error.unwrap_or_else(|| "unreachable".to_string()),
        }
    } else {
        ProbeOutcome::NoSpec
    }
}

/// GET one candidate path. `Ok(None)` is a clean miss (non-200, wrong
/// content type, or a body that is not a valid spec); `Err` is a transport
/// failure (connect error, timeout).
async fn try_path(
    http: &reqwest::Client,
    base_url: &str,
    path: &str,
) -> anyhow::Result<Option<OpenApiDocument>> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);
    let resp = http
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await?;

    if resp.status() != reqwest::StatusCode::OK {
        return Ok(None);
    }
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.contains("application/json") {
        return Ok(None);
    }

    let doc: serde_json::Value = match resp.json().await {
        Ok(doc) => doc,
        Err(_) => return Ok(None),
    };
    Ok(OpenApiDocument::classify(doc))
}
