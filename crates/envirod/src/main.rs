//! Enviro Daemon - query service over the readings store.
//!
//! Answers the dashboard API from the readings table: station inventory,
//! latest reading per station, and windowed sensor history.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use enviro_common::EnviroConfig;
use envirod::query::QueryService;
use envirod::server::{self, AppState};
use envirod::store::{DynamoBackend, MemoryBackend, StoreClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "envirod")]
#[command(about = "Environmental data query daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "enviro.toml")]
    config: PathBuf,

    /// Listen address, overriding the configuration file
    #[arg(long)]
    listen: Option<String>,

    /// Serve from an empty in-memory store instead of the real table
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EnviroConfig::load_from(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();

    info!("Enviro Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let store = if cli.memory {
        info!("serving from an in-memory store");
        StoreClient::new(Arc::new(MemoryBackend::new()))
    } else {
        info!(
            "serving from table {} in {}",
            config.store.table, config.store.region
        );
        let backend = DynamoBackend::connect(&config.store.region, &config.store.table).await;
        StoreClient::new(Arc::new(backend))
    };

    let listen = cli.listen.unwrap_or(config.api.listen);
    let query = QueryService::new(store, config.api.history_window_hours);
    server::run(AppState::new(query), &listen).await
}
