//! Daemon configuration from the command line and environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub const NODE_ID_ENV: &str = "AHABD_NODE_ID";
pub const METRICS_ADDR_ENV: &str = "AHABD_METRICS_ADDR";
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8081";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AHABD_NODE_ID must be set to the name of this node")]
    MissingNodeId,

    #[error("invalid AHABD_METRICS_ADDR {value:?}: {source}")]
    InvalidMetricsAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid duration {0:?}: expected e.g. 1h, 30m, 1h30m, 45s or 500ms")]
    InvalidDuration(String),

    #[error("duration must be greater than zero")]
    ZeroDuration,
}

/// Everything the daemon needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub node_id: String,
    pub metrics_addr: SocketAddr,
    pub period: Duration,
}

impl DaemonConfig {
    pub fn from_env(period: Duration) -> Result<Self, ConfigError> {
        Self::from_lookup(period, |key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(period: Duration, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let node_id = lookup(NODE_ID_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingNodeId)?;

        let raw_addr = lookup(METRICS_ADDR_ENV).unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = raw_addr
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidMetricsAddr {
                value: raw_addr.clone(),
                source,
            })?;

        Ok(Self {
            node_id,
            metrics_addr,
            period,
        })
    }
}

/// Parse `1h`, `30m`, `45s`, `500ms`, compounds like `1h30m`, or a bare
/// integer as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    if s.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let (unit, len) = if rest.starts_with("ms") {
            (Duration::from_millis(1), 2)
        } else if rest.starts_with('h') {
            (Duration::from_secs(3600), 1)
        } else if rest.starts_with('m') {
            (Duration::from_secs(60), 1)
        } else if rest.starts_with('s') {
            (Duration::from_secs(1), 1)
        } else {
            return Err(invalid());
        };
        rest = &rest[len..];

        let part = u32::try_from(value)
            .ok()
            .and_then(|v| unit.checked_mul(v))
            .ok_or_else(invalid)?;
        total = total.checked_add(part).ok_or_else(invalid)?;
    }
    Ok(total)
}

/// `--period` value parser: a duration that is not zero.
pub fn parse_period(s: &str) -> Result<Duration, ConfigError> {
    let period = parse_duration(s)?;
    if period.is_zero() {
        return Err(ConfigError::ZeroDuration);
    }
    Ok(period)
}
