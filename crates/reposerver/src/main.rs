//! Armory repo server binary.

use anyhow::{Context, Result};
use armory_core::config::RepoServerConfig;
use armory_reposerver::{AppState, HttpKeyserverClient, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Armory repo server - TUF target catalog and derived roles
#[derive(Parser, Debug)]
#[command(name = "reposerverd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "ARMORY_REPOSERVER_CONFIG",
        default_value = "config/reposerver.toml"
    )]
    config: String,
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

    tracing::info!("Armory repo server v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("no config file found at {}", args.config);
    }

    let config: RepoServerConfig = figment
        .merge(Env::prefixed("ARMORY_REPOSERVER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    armory_reposerver::metrics::register_metrics();

    let metadata = armory_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("metadata store initialized");

    let storage = armory_storage::from_config(&config.storage)
        .await
        .context("failed to initialize target storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("target storage initialized");

    let keys = Arc::new(
        HttpKeyserverClient::new(&config.keyserver.base_url)
            .context("failed to build key server client")?,
    );
    tracing::info!(keyserver = %config.keyserver.base_url, "key server client ready");

    let state = AppState::new(config.clone(), metadata, storage, keys);
    let app = create_router(state);

    let addr: SocketAddr = config.bind.parse().context("invalid bind address")?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
