use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle phase of the discovery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopPhase {
    Stopped,
    Idle,
    Ticking,
    RetryBackoff,
}

impl std::fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopPhase::Stopped => write!(f, "Stopped"),
            LoopPhase::Idle => write!(f, "Idle"),
            LoopPhase::Ticking => write!(f, "Ticking"),
            LoopPhase::RetryBackoff => write!(f, "RetryBackoff"),
        }
    }
}

/// Snapshot of the discovery loop's scheduling state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopStatus {
    pub phase: LoopPhase,
    pub retry_count: u32,
    pub last_successful_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub interval_ms: u64,
}

/// Read-only view of the mesh manager, for operational visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshStats {
    pub service_count: usize,
    pub service_names: Vec<String>,
    pub has_config: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshHealth {
    pub healthy: bool,
    pub has_config: bool,
    pub service_count: usize,
}

/// GET /api/v1/status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatus {
    #[serde(rename = "loop")]
    pub discovery: LoopStatus,
    pub mesh: MeshStats,
    pub store: String,
    pub metrics: BTreeMap<String, i64>,
}

/// POST /api/v1/discovery/refresh response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub changed: bool,
}

/// PUT /api/v1/discovery/config request body. Interval fields use the
/// `<number><unit>` string form; omitted fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfigUpdate {
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub selector_labels: Option<String>,
    #[serde(default)]
    pub retry_delay: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}
