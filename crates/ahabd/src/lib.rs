//! ahabd — node-resident health remediation daemon.
//!
//! Assembles the fixers, their exported counters and the `/metrics`
//! endpoint under one supervisor sharing a single cancellation token.

pub mod config;
pub mod daemon;
pub mod metrics_server;

pub use config::{parse_duration, ConfigError, DaemonConfig};
pub use daemon::{run, run_until, METRICS_SOURCE};
