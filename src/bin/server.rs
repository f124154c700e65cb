//! HTTP/WebSocket server binary for lipbridge.

use std::path::PathBuf;

use clap::Parser;
use lipbridge::{AppState, BridgeConfig, BridgeServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Chat-to-avatar voice bridge with live lip-sync.
#[derive(Parser)]
#[command(name = "lipbridge-server", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lipbridge=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = BridgeConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!(
        llm = %config.llm.base_url,
        tts = %config.tts.endpoint,
        stt = %config.stt.base_url,
        db = %config.store.db_path.display(),
        "starting lipbridge v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = AppState::from_config(config)?;
    let server = BridgeServer::start(state).await?;
    let shutdown = server.shutdown_token();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            server.shutdown().await;
        }
        _ = shutdown.cancelled() => {
            server.wait().await;
        }
    }
    Ok(())
}
