use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use download_engine::config::DEFAULT_PORT;
use download_engine::{DownloadEngine, DownloadServer, EngineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let port = match std::env::var("PORT") {
        Ok(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("invalid PORT value {raw:?}"))?,
        Err(_) => DEFAULT_PORT,
    };

    let mut config = EngineConfig::default();
    if let Ok(dir) = std::env::var("DOWNLOAD_DIR") {
        config.download_dir = PathBuf::from(dir);
    }
    info!(
        "downloads land in {} (max {} concurrent)",
        config.download_dir.display(),
        config.max_concurrent_transfers
    );

    let engine = Arc::new(DownloadEngine::new(config).context("engine startup failed")?);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server = DownloadServer::start(engine, addr).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.shutdown();

    Ok(())
}
