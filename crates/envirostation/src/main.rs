//! Enviro Station - simulated environmental sensor station.
//!
//! Generates readings for the standard sensor suite and publishes them to
//! the MQTT broker over mutual TLS until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use enviro_common::{EnviroConfig, Station};
use envirostation::publisher::MqttPublisher;
use envirostation::runner::StationRunner;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "envirostation")]
#[command(about = "Simulated environmental sensor station", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "enviro.toml")]
    config: PathBuf,

    /// Use a fixed station identity instead of generating one
    #[arg(long)]
    station_id: Option<String>,

    /// Seconds between readings, overriding the configured interval
    #[arg(long)]
    interval: Option<u64>,
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

    let station = match cli.station_id {
        Some(id) => Station::with_id(id),
        None => Station::new(),
    };
    info!(
        "Enviro Station v{} starting as {}",
        env!("CARGO_PKG_VERSION"),
        station.station_id()
    );

    let publisher = MqttPublisher::new(
        station.station_id().to_string(),
        &config.broker,
        &config.tls,
    );
    let connect_timeout = Duration::from_secs(config.broker.connect_timeout_secs);
    if !publisher.connect(connect_timeout).await {
        error!(
            "could not reach broker {}:{}",
            config.broker.endpoint, config.broker.port
        );
        std::process::exit(1);
    }

    let interval = cli.interval.unwrap_or(config.station.publish_interval_secs);
    let mut runner = StationRunner::new(
        station,
        publisher,
        config.broker.topic_base.clone(),
        Duration::from_secs(interval),
    );
    runner
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("ctrl-c handler failed: {e}");
            }
        })
        .await;

    info!("Station shutdown complete");
    Ok(())
}
