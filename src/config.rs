use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::model::ReservationStatus;

/// Process settings, read from `COTTAGE_*` environment variables.
/// Numeric values that fail to parse fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// JSON room seeds; the built-in inventory is used when unset.
    pub rooms_file: Option<PathBuf>,
    pub default_status: ReservationStatus,
    pub sweep_interval: Duration,
    pub compact_threshold: u64,
    pub write_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.var, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            rooms_file: None,
            default_status: ReservationStatus::Pending,
            sweep_interval: Duration::from_secs(60),
            compact_threshold: 1000,
            write_timeout: Duration::from_millis(5000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let default_status = match lookup("COTTAGE_DEFAULT_STATUS") {
            None => defaults.default_status,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "pending" => ReservationStatus::Pending,
                "confirmed" => ReservationStatus::Confirmed,
                _ => {
                    return Err(ConfigError {
                        var: "COTTAGE_DEFAULT_STATUS",
                        message: format!("expected pending or confirmed, got {raw:?}"),
                    });
                }
            },
        };

        Ok(Self {
            data_dir: lookup("COTTAGE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: lookup("COTTAGE_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
            rooms_file: lookup("COTTAGE_ROOMS_FILE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            default_status,
            sweep_interval: number("COTTAGE_SWEEP_INTERVAL_SECS")
                .filter(|&s| s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            compact_threshold: number("COTTAGE_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            write_timeout: number("COTTAGE_WRITE_TIMEOUT_MS")
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_timeout),
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("cottage.wal")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            wal_path: self.wal_path(),
            default_status: self.default_status,
            write_timeout: self.write_timeout,
        }
    }
}
