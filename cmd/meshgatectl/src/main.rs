use clap::{Parser, Subcommand};
use pkg_constants::network::DEFAULT_GATEWAY_ADDR;
use pkg_types::endpoint::ServiceEndpoint;
use pkg_types::mesh::MeshConfiguration;
use pkg_types::status::{GatewayStatus, RefreshResponse};
use tracing::info;

#[derive(Parser)]
#[command(name = "meshgatectl", about = "CLI tool for the meshgate gateway")]
struct Cli {
    /// Gateway API endpoint
    #[arg(long, default_value = DEFAULT_GATEWAY_ADDR)]
    gateway: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway and discovery loop status
    Status,
    /// Inspect discovered services
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
    /// Inspect the generated mesh configuration
    Mesh {
        #[command(subcommand)]
        action: MeshAction,
    },
    /// Control the discovery loop
    Discovery {
        #[command(subcommand)]
        action: DiscoveryAction,
    },
}

#[derive(Subcommand)]
enum ServiceAction {
    /// List services seen by the most recent discovery tick
    List,
}

#[derive(Subcommand)]
enum MeshAction {
    /// Print the current mesh configuration as JSON
    Show,
}

#[derive(Subcommand)]
enum DiscoveryAction {
    /// Run a discovery tick right now
    Refresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let client = reqwest::Client::new();
    let gateway = cli.gateway.trim_end_matches('/');

    match &cli.command {
        Commands::Status => {
            info!("Querying status from {}", gateway);
            let resp = client
                .get(format!("{}/api/v1/status", gateway))
                .send()
                .await?;

            if !resp.status().is_success() {
                eprintln!("Error: gateway returned {}", resp.status());
                std::process::exit(1);
            }

            let status: GatewayStatus = resp.json().await?;
            println!("Phase:             {}", status.discovery.phase);
            println!("Retry count:       {}", status.discovery.retry_count);
            println!("Interval:          {}ms", status.discovery.interval_ms);
            println!(
                "Last success:      {}",
                status
                    .discovery
                    .last_successful_run
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "(never)".to_string())
            );
            println!(
                "Last error:        {}",
                status.discovery.last_error.as_deref().unwrap_or("(none)")
            );
            println!("Store:             {}", status.store);
            println!("Mesh sources:      {}", status.mesh.service_count);
            println!("Config exists:     {}", status.mesh.has_config);
        }
        Commands::Service { action } => match action {
            ServiceAction::List => {
                info!("Querying services from {}", gateway);
                let resp = client
                    .get(format!("{}/api/v1/services", gateway))
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    eprintln!("Error: gateway returned {}", resp.status());
                    std::process::exit(1);
                }

                let services: Vec<ServiceEndpoint> = resp.json().await?;

                println!(
                    "{:<24} {:<16} {:<7} {:<8} {}",
                    "NAME", "NAMESPACE", "READY", "OPENAPI", "SPEC PATH"
                );
                for svc in &services {
                    println!(
                        "{:<24} {:<16} {:<7} {:<8} {}",
                        svc.name,
                        svc.namespace,
                        svc.ready,
                        svc.has_openapi,
                        svc.openapi_url.as_deref().unwrap_or("-")
                    );
                }

                if services.is_empty() {
                    println!("(no services discovered)");
                }
            }
        },
        Commands::Mesh { action } => match action {
            MeshAction::Show => {
                let resp = client
                    .get(format!("{}/api/v1/mesh/config", gateway))
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    eprintln!("Error: gateway returned {}", resp.status());
                    std::process::exit(1);
                }

                let config: MeshConfiguration = resp.json().await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        },
        Commands::Discovery { action } => match action {
            DiscoveryAction::Refresh => {
                info!("Forcing a discovery run via {}", gateway);
                let resp = client
                    .post(format!("{}/api/v1/discovery/refresh", gateway))
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    eprintln!("Error: gateway returned {}", resp.status());
                    std::process::exit(1);
                }

                let refresh: RefreshResponse = resp.json().await?;
                if refresh.changed {
                    println!("Discovery complete: mesh configuration updated");
                } else {
                    println!("Discovery complete: no changes");
                }
            }
        },
    }

    Ok(())
}
