//! Courier order feed - Entry Point

use anyhow::Result;
use clap::Parser;
use courier_app::config::{CONFIG_ENV, DEFAULT_CONFIG_PATH};
use tracing::info;

/// Driver order feed: polls and subscribes, logs the merged feed and alert state.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via COURIER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured driver id
    #[arg(long)]
    driver: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any socket connections)
    courier_ws::init_crypto();

    let args = Args::parse();

    // Determine config path: CLI arg > COURIER_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = courier_app::AppConfig::from_file(&config_path)?;
    if let Some(driver) = args.driver {
        config.driver_id = driver;
    }

    courier_telemetry::init_logging_with_default(&config.telemetry.log_level)?;

    info!("Starting courier v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, driver_id = %config.driver_id, "Configuration loaded");

    let app = courier_app::Application::new(config)?;
    info!(session_id = %app.session_id(), "Session created");

    app.run().await?;

    Ok(())
}
