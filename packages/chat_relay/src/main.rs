use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use relay_core::RandomIds;
use tracing::info;
use tracing_subscriber::prelude::*;

mod config;
mod handlers;
mod metrics;
mod server;
mod ws;


use config::{DEFAULT_CONFIG_FILE, FileConfig, RelayConfig, load_config};
use server::AppState;

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "Realtime chat, voice and signaling relay over WebSockets")]
struct Cli {
    /// Interface to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file (defaults to ./relay.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_directive = if args.debug {
        "chat_relay=debug,relay_core=debug,tower_http=debug,info"
    } else {
        "chat_relay=info,relay_core=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config_file = match args.config {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            path
        }
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };

    let mut file_config: FileConfig = load_config(&config_file)
        .extract()
        .with_context(|| format!("Failed to load config from {}", config_file.display()))?;
    if let Some(host) = args.host {
        file_config.server.host = host;
    }
    if let Some(port) = args.port {
        file_config.server.port = port;
    }

    let config = RelayConfig::from_file(&file_config);
    let addr = config.bind_addr()?;
    info!(
        history_capacity = ?config.hub.history_capacity,
        outbound_capacity = config.hub.outbound_capacity,
        send_timeout = ?config.send_timeout,
        "Starting chat relay"
    );

    let state = AppState::new(config, Arc::new(RandomIds));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Chat relay listening on http://{}", actual_addr);
    info!("Endpoints:");
    info!("  GET    /socket.io/    - Socket.IO (framed events)");
    info!("  GET    /              - Raw message WebSocket");
    info!("  GET    /ws            - Raw message WebSocket (alias)");
    info!("  GET    /health        - Health status");
    info!("  GET    /health/live   - Liveness check");
    info!("  GET    /health/ready  - Readiness check");
    info!("  GET    /metrics       - Server metrics");

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, stopping...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("Chat relay stopped");
    Ok(())
}
