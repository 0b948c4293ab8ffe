use std::net::SocketAddr;
use std::time::Instant;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: lifecycle operations. Labels: op, outcome.
pub const OPERATIONS_TOTAL: &str = "cottage_operations_total";

/// Histogram: lifecycle operation latency in seconds. Labels: op.
pub const OPERATION_DURATION_SECONDS: &str = "cottage_operation_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: rooms held by the engine.
pub const ROOMS_ACTIVE: &str = "cottage_rooms_active";

/// Counter: reservations moved to COMPLETED by the sweeper.
pub const SWEEP_COMPLETED_TOTAL: &str = "cottage_sweep_completed_total";

/// Counter: WAL compactions run by the background compactor.
pub const COMPACTIONS_TOTAL: &str = "cottage_compactions_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "cottage_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "cottage_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Outcome label for a finished operation.
pub fn outcome_label<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    }
}

/// Count and time one lifecycle operation.
pub fn record_operation<T>(op: &'static str, started: Instant, result: &Result<T, EngineError>) {
    metrics::counter!(OPERATIONS_TOTAL, "op" => op, "outcome" => outcome_label(result))
        .increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}
