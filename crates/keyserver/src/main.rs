//! Armory key server binary.

use anyhow::{Context, Result};
use armory_core::config::KeyServerConfig;
use armory_keyserver::{AppState, create_router, keygen};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Armory key server - TUF key material and root role authority
#[derive(Parser, Debug)]
#[command(name = "keyserverd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "ARMORY_KEYSERVER_CONFIG",
        default_value = "config/keyserver.toml"
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

    tracing::info!("Armory key server v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("no config file found at {}", args.config);
    }

    let config: KeyServerConfig = figment
        .merge(Env::prefixed("ARMORY_KEYSERVER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    armory_keyserver::metrics::register_metrics();

    let metadata = armory_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("metadata store initialized");

    let vault = armory_vault::from_config(&config.vault)
        .await
        .context("failed to initialize vault")?;
    vault
        .health_check()
        .await
        .context("vault health check failed")?;
    tracing::info!("vault initialized");

    let state = AppState::new(config.clone(), metadata, vault);

    // Drive pending key generation requests and finalize root documents.
    let _keygen_handle = keygen::spawn_keygen_worker(state.clone());

    let app = create_router(state);
    let addr: SocketAddr = config.bind.parse().context("invalid bind address")?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
