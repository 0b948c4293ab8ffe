pub mod config;
pub mod dates;
pub mod engine;
pub mod filter;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reaper;
pub mod seed;
pub mod wal;
