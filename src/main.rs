use anyhow::{Context, Result};
use livemap::clock::SystemClock;
use livemap::config::{load_config, LiveMapConfig};
use livemap::poller::HttpSource;
use livemap::render::Canvas;
use livemap::LiveMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livemap=info".into()),
        )
        .init();

    info!("Livemap starting...");

    // Config path: first argument, then LIVEMAP_CONFIG, else defaults
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LIVEMAP_CONFIG").ok())
        .map(PathBuf::from);

    let mut config = match &config_path {
        Some(path) => load_config(path)?,
        None => LiveMapConfig::default(),
    };
    config.apply_env();
    config.validate().context("Invalid configuration")?;

    info!(
        base_url = %config.server.base_url,
        sightings_interval_secs = config.poll.sightings_interval_secs,
        workers_interval_secs = config.poll.workers_interval_secs,
        control_points_interval_secs = config.poll.control_points_interval_secs,
        decay_tick_ms = config.decay.tick_interval_ms,
        "Configuration loaded"
    );

    let canvas = Arc::new(Canvas::new());
    let source = Arc::new(HttpSource::new(config.server.base_url.clone()));
    let mut map = LiveMap::new(&config, canvas.clone(), Arc::new(SystemClock), source);

    let tasks = map.start().context("Failed to start live map")?;
    info!(tasks, "Live map running");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    map.shutdown();
    info!(visuals = canvas.len(), "Livemap stopped");

    Ok(())
}
