//! Memory Match Game Server
//!
//! Authoritative coordinator for two-player memory match games.

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use memory_match::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    info!("Memory Match Server v{}", VERSION);
    info!("Max connections: {}", config.max_connections);
    info!("Mismatch reset delay: {:?}", config.mismatch_reset_delay);
    if let Some(seed) = config.deal_seed {
        warn!("Deal seed fixed to {}, shuffles are reproducible", seed);
    }

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_server.shutdown().await;
        }
    });

    server.run().await?;

    info!("Server stopped");
    Ok(())
}
