//! Mesh gateway binary.
//!
//! ```text
//!   client ──▶ :8090 ──▶ request id ─▶ trace ─▶ security headers ─▶ CORS ─▶ rate limit
//!                                                                          │
//!                 /, /health, /services ◀──────────────────────────────────┤
//!                                                                          ▼
//!              /api/v1/<service>/... ─▶ registry ─▶ load balancer ─▶ circuit breaker ─▶ instance
//!
//!   health checker ──GET /health every interval──▶ every registered instance
//!   admin API :9091 (bearer auth) ──register / deregister / breakers
//! ```

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mesh_gateway::config::{load_config, GatewayConfig};
use mesh_gateway::lifecycle::{signals::spawn_signal_handler, Gateway};
use mesh_gateway::observability::{init_metrics, init_tracing};

#[derive(Parser)]
#[command(name = "mesh-gateway", version, about = "API gateway and service mesh", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG", default_value = "gateway.toml")]
    config: PathBuf,

    /// Override the listener bind address
    #[arg(short, long, env = "GATEWAY_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config_present = args.config.exists();
    let mut config = if config_present {
        load_config(&args.config)?
    } else {
        GatewayConfig::default()
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mesh-gateway starting");
    if !config_present {
        tracing::warn!(path = %args.config.display(), "Config file not found, using defaults");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        api_prefix = %config.routing.api_prefix,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let gateway = Gateway::build(config);
    spawn_signal_handler(gateway.shutdown());

    if config_present {
        if let Err(e) = gateway.spawn_config_reload(&args.config) {
            tracing::warn!(error = %e, "Config hot reload disabled");
        }
    }

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");
    gateway.serve(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
