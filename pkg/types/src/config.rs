use anyhow::{Context, bail};
use pkg_constants::discovery::{DEFAULT_MAX_RETRIES, DEFAULT_SERVICE_SELECTOR};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gateway server configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// namespace: team-apps
/// selector-labels: app.kubernetes.io/managed-by=kubevela
/// discovery-interval: 5m
/// auto-discovery: true
/// gateway-port: 4000
/// mesh-config-path: /etc/meshgate/mesh-config.json
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfigFile {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default, alias = "selector-labels")]
    pub selector_labels: Option<String>,
    #[serde(default, alias = "discovery-interval")]
    pub discovery_interval: Option<String>,
    #[serde(default, alias = "retry-delay")]
    pub retry_delay: Option<String>,
    #[serde(default, alias = "max-retries")]
    pub max_retries: Option<u32>,
    #[serde(default, alias = "auto-discovery")]
    pub auto_discovery: Option<bool>,
    #[serde(default, alias = "gateway-port")]
    pub gateway_port: Option<u16>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, alias = "mesh-config-path")]
    pub mesh_config_path: Option<String>,
    #[serde(default, alias = "mesh-config-map")]
    pub mesh_config_map: Option<String>,
    #[serde(default, alias = "kubernetes-api-url")]
    pub kubernetes_api_url: Option<String>,
    #[serde(default, alias = "kubernetes-token")]
    pub kubernetes_token: Option<String>,
    #[serde(default)]
    pub introspection: Option<bool>,
    #[serde(default)]
    pub cors: Option<bool>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path))?;
    Ok(config)
}

/// Runtime options of the discovery loop. Built once at startup and
/// replaceable while running via `DiscoveryLoop::update_config`.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Label selector for discoverable services.
    pub selector: String,
    /// Regular polling cadence.
    pub interval: Duration,
    /// Base delay for exponential retry backoff.
    pub retry_delay: Duration,
    /// Retries before giving up and resuming the regular cadence.
    pub max_retries: u32,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            selector: DEFAULT_SERVICE_SELECTOR.to_string(),
            interval: Duration::from_secs(300),
            retry_delay: Duration::from_secs(30),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl DiscoveryOptions {
    /// Reject configurations the loop cannot run with. Called synchronously
    /// at construction and reconfiguration time, never inside the loop.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval.is_zero() {
            bail!("discovery interval must be greater than zero");
        }
        if self.retry_delay.is_zero() {
            bail!("retry delay must be greater than zero");
        }
        if self.selector.is_empty() {
            bail!("service selector must not be empty");
        }
        Ok(())
    }
}

/// Parse an interval string of the form `<number><unit>` where unit is one
/// of `ms`, `s`, `m`, `h`, `d`. Examples: `5m`, `30s`, `1500ms`.
pub fn parse_interval(input: &str) -> anyhow::Result<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);

    if digits.is_empty() {
        bail!("invalid interval '{}': missing numeric value", input);
    }
    let value: u64 = digits
        .parse()
        .with_context(|| format!("invalid interval '{}'", input))?;

    let millis = match unit {
        "ms" => value,
        "s" => value * 1_000,
        "m" => value * 60_000,
        "h" => value * 3_600_000,
        "d" => value * 86_400_000,
        "" => bail!("invalid interval '{}': missing unit (ms|s|m|h|d)", input),
        other => bail!("invalid interval '{}': unknown unit '{}'", input, other),
    };
    Ok(Duration::from_millis(millis))
}
