use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use cottage::config::Config;
use cottage::dates::SystemClock;
use cottage::engine::Engine;
use cottage::notify::NotifyHub;
use cottage::{reaper, seed};

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    cottage::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;

    let engine = Arc::new(Engine::open(
        config.engine_config(),
        Arc::new(SystemClock),
        Arc::new(NotifyHub::new()),
    )?);

    let seeds = match &config.rooms_file {
        Some(path) => seed::load_room_seeds(path)?,
        None => seed::default_rooms(),
    };
    seed::seed_if_empty(&engine, seeds).await?;

    let sweeper = tokio::spawn(reaper::run_sweeper(engine.clone(), config.sweep_interval));
    let compactor = tokio::spawn(reaper::run_compactor(
        engine.clone(),
        config.compact_threshold,
        COMPACT_CHECK_INTERVAL,
    ));

    info!("cottage reservations ready");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  default status: {}", config.default_status);
    info!("  sweep interval: {:?}", config.sweep_interval);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );
    for room in engine.list_rooms().await {
        info!(
            "  room {} ({}): sleeps {}, {}",
            room.name,
            room.id,
            room.max_occupancy,
            if room.is_available { "open" } else { "closed" }
        );
    }

    // Stop on SIGTERM/ctrl-c. Every commit is already durable, so the
    // background tasks can simply be dropped.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received");
    sweeper.abort();
    compactor.abort();
    if let Err(e) = engine.compact_wal().await {
        tracing::warn!("final compaction skipped: {e}");
    }
    info!("cottage stopped");
    Ok(())
}
