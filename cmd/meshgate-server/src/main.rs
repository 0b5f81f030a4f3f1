use anyhow::bail;
use clap::Parser;
use pkg_constants::discovery::{
    DEFAULT_INTERVAL, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_SERVICE_SELECTOR,
};
use pkg_constants::network::{DEFAULT_GATEWAY_PORT, DEFAULT_HOST};
use pkg_constants::paths::{DEFAULT_MESH_CONFIG_PATH, DEFAULT_SERVER_CONFIG};
use pkg_discovery::{DiscoveryLoop, ServiceDiscovery};
use pkg_gateway::server::start_server;
use pkg_gateway::{AppState, GatewaySettings};
use pkg_kube::{HttpKubeClient, KubeClient};
use pkg_mesh::{ConfigMapStore, ConfigStore, FileConfigStore, MeshManager};
use pkg_metrics::MetricsRegistry;
use pkg_types::config::{DiscoveryOptions, GatewayConfigFile, load_config_file, parse_interval};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "meshgate-server", about = "meshgate discovery loop and gateway server")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_SERVER_CONFIG)]
    config: String,

    /// Port for the gateway server
    #[arg(long)]
    port: Option<u16>,

    /// Bind host for the gateway server
    #[arg(long)]
    host: Option<String>,

    /// Namespace to discover in (all namespaces when omitted)
    #[arg(long)]
    namespace: Option<String>,

    /// Label selector for discoverable services
    #[arg(long)]
    selector: Option<String>,

    /// Discovery interval, e.g. 30s or 5m
    #[arg(long)]
    interval: Option<String>,

    /// Destination file for the mesh configuration
    #[arg(long)]
    mesh_config_path: Option<String>,

    /// Write the mesh configuration to a ConfigMap instead (namespace/name)
    #[arg(long)]
    mesh_config_map: Option<String>,

    /// Kubernetes API endpoint (in-cluster configuration when omitted)
    #[arg(long)]
    kube_api: Option<String>,

    /// Bearer token for the Kubernetes API
    #[arg(long)]
    kube_token: Option<String>,

    /// Do not start the discovery loop automatically
    #[arg(long)]
    no_auto_discovery: bool,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    env_var(name).map(|v| !matches!(v.as_str(), "false" | "0" | "no"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: GatewayConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > environment > config file > defaults
    let port = cli
        .port
        .or_else(|| env_var("GATEWAY_PORT").and_then(|v| v.parse().ok()))
        .or(file_cfg.gateway_port)
        .unwrap_or(DEFAULT_GATEWAY_PORT);
    let host = cli
        .host
        .or_else(|| env_var("HOST"))
        .or(file_cfg.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let namespace = cli
        .namespace
        .or_else(|| env_var("NAMESPACE"))
        .or(file_cfg.namespace);
    let selector = cli
        .selector
        .or_else(|| env_var("SERVICE_SELECTOR_LABELS"))
        .or(file_cfg.selector_labels)
        .unwrap_or_else(|| DEFAULT_SERVICE_SELECTOR.to_string());

    // Bad interval strings must fail here, before the loop exists.
    let interval = parse_interval(
        &cli.interval
            .or_else(|| env_var("DISCOVERY_INTERVAL"))
            .or(file_cfg.discovery_interval)
            .unwrap_or_else(|| DEFAULT_INTERVAL.to_string()),
    )?;
    let retry_delay = parse_interval(
        &env_var("DISCOVERY_RETRY_DELAY")
            .or(file_cfg.retry_delay)
            .unwrap_or_else(|| DEFAULT_RETRY_DELAY.to_string()),
    )?;
    let max_retries = env_var("DISCOVERY_MAX_RETRIES")
        .and_then(|v| v.parse().ok())
        .or(file_cfg.max_retries)
        .unwrap_or(DEFAULT_MAX_RETRIES);

    let auto_discovery = if cli.no_auto_discovery {
        false
    } else {
        env_bool("AUTO_DISCOVERY")
            .or(file_cfg.auto_discovery)
            .unwrap_or(true)
    };
    let mesh_config_path = cli
        .mesh_config_path
        .or_else(|| env_var("MESH_CONFIG_PATH"))
        .or(file_cfg.mesh_config_path)
        .unwrap_or_else(|| DEFAULT_MESH_CONFIG_PATH.to_string());
    let mesh_config_map = cli
        .mesh_config_map
        .or_else(|| env_var("MESH_CONFIG_MAP"))
        .or(file_cfg.mesh_config_map);
    let introspection = env_bool("INTROSPECTION_ENABLED")
        .or(file_cfg.introspection)
        .unwrap_or(true);
    let cors = env_bool("CORS_ENABLED").or(file_cfg.cors).unwrap_or(false);

    info!("Starting meshgate-server");
    info!("  Gateway:    {}:{}", host, port);
    info!("  Namespace:  {}", namespace.as_deref().unwrap_or("(all)"));
    info!("  Selector:   {}", selector);
    info!("  Interval:   {:?}", interval);
    info!("  Auto-start: {}", auto_discovery);

    // Kubernetes client: explicit endpoint wins, else in-cluster discovery.
    let kube: Arc<dyn KubeClient> = match cli
        .kube_api
        .or_else(|| env_var("KUBERNETES_API_URL"))
        .or(file_cfg.kubernetes_api_url)
    {
        Some(url) => {
            let token = cli
                .kube_token
                .or_else(|| env_var("KUBERNETES_TOKEN"))
                .or(file_cfg.kubernetes_token);
            info!("  Kube API:   {}", url);
            Arc::new(HttpKubeClient::new(&url, token)?)
        }
        None => Arc::new(HttpKubeClient::in_cluster()?),
    };

    let store: Arc<dyn ConfigStore> = match mesh_config_map {
        Some(target) => {
            let Some((ns, name)) = target.split_once('/') else {
                bail!("invalid --mesh-config-map '{}': expected namespace/name", target);
            };
            Arc::new(ConfigMapStore::new(kube.clone(), ns, name))
        }
        None => Arc::new(FileConfigStore::new(&mesh_config_path)),
    };
    info!("  Store:      {}", store.describe());

    let discovery = ServiceDiscovery::new(kube, namespace)?;
    let mesh = Arc::new(MeshManager::new(store).await);
    let metrics = Arc::new(MetricsRegistry::for_discovery());
    let options = DiscoveryOptions {
        selector,
        interval,
        retry_delay,
        max_retries,
    };
    let discovery_loop = DiscoveryLoop::new(discovery, mesh.clone(), metrics.clone(), options)?;

    if auto_discovery {
        discovery_loop.start();
    } else {
        info!("Auto discovery disabled; waiting for a manual refresh");
    }

    let state = AppState {
        discovery_loop: discovery_loop.clone(),
        mesh,
        metrics,
        settings: Arc::new(GatewaySettings {
            introspection,
            cors,
        }),
    };

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    start_server(addr, state).await?;

    // Server returned after ctrl-c: wind the loop down before exiting.
    discovery_loop.stop();
    info!("Shutdown complete");
    Ok(())
}
