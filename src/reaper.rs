use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::observability;

/// Complete every active reservation whose check-out date has arrived.
/// Returns how many were completed.
pub async fn sweep_once(engine: &Engine) -> usize {
    let due = engine.collect_completable(engine.today()).await;
    let mut completed = 0;
    for id in due {
        match engine.complete_reservation(id).await {
            Ok(_) => {
                completed += 1;
                debug!("completed reservation {id}");
            }
            // Cancelled or edited since it was collected
            Err(e) => debug!("sweep skip {id}: {e}"),
        }
    }
    if completed > 0 {
        metrics::counter!(observability::SWEEP_COMPLETED_TOTAL).increment(completed as u64);
        info!("sweep completed {completed} reservations");
    }
    completed
}

/// Background task: periodic completion sweep plus change-feed housekeeping.
pub async fn run_sweeper(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        sweep_once(&engine).await;
        engine.notify().prune();
    }
}

/// Compact the log once it has grown by `threshold` appends. Returns whether
/// a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(events) => {
            metrics::counter!(observability::COMPACTIONS_TOTAL).increment(1);
            info!("compacted WAL after {appends} appends, {events} events kept");
            true
        }
        Err(e) => {
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}

pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}
