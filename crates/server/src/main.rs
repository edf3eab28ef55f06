//! Sluice server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use sluice_core::config::AppConfig;
use sluice_server::{AppState, create_router};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sluice - streams uploads to slow block storage in bounded memory
#[derive(Parser, Debug)]
#[command(name = "sluiced")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SLUICE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration: optional TOML file, then `SLUICE_` environment
/// variables (`SLUICE_INGEST__CHUNK_SIZE=4096`).
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("SLUICE_") && key != "SLUICE_CONFIG");
    if has_env_config {
        tracing::info!("Applying configuration from environment variables");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SLUICE_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Sluice v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    tracing::info!(
        buffer_count = config.ingest.buffer_count,
        chunk_size = config.ingest.chunk_size,
        max_resident_bytes = config.ingest.max_resident_bytes(),
        stall_timeout_ms = config.ingest.stall_timeout_ms,
        "Ingest pipeline configured"
    );

    let storage = sluice_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    // Refuse to start without a usable card rather than report healthy.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend connectivity verified");

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    let state = AppState::new(config, storage).context("failed to start upload controller")?;
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
