//! kube-proxy `/healthz` observation.
//!
//! kube-proxy reports when it last synced its rules alongside its own
//! clock. Anything lagging by more than [`STALE_AFTER`] is unhealthy.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tracing::debug;

use crate::error::{KubeError, KubeResult};

/// kube-proxy's default healthz port.
pub const HEALTHZ_PORT: u16 = 10256;

/// Maximum accepted lag between the last rule sync and now.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

/// Outcome of one healthz probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// Rules synced within [`STALE_AFTER`].
    Healthy,
    /// Endpoint answered but reports stale rules (or a non-2xx status).
    Unhealthy,
    /// Endpoint unreachable, timed out or returned garbage.
    Failed,
}

/// Body served by kube-proxy's healthz endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyHealthz {
    pub last_updated: String,
    pub current_time: String,
}

impl ProxyHealthz {
    pub fn parse(body: &[u8]) -> KubeResult<Self> {
        serde_json::from_slice(body).map_err(|e| KubeError::Healthz(e.to_string()))
    }

    /// How far the last rule sync lags behind kube-proxy's clock.
    pub fn lag(&self) -> KubeResult<chrono::Duration> {
        let last = parse_timestamp(&self.last_updated)?;
        let now = parse_timestamp(&self.current_time)?;
        Ok(now.signed_duration_since(last))
    }

    pub fn is_stale(&self, limit: Duration) -> KubeResult<bool> {
        let limit = chrono::Duration::from_std(limit)
            .map_err(|e| KubeError::Healthz(e.to_string()))?;
        Ok(self.lag()? > limit)
    }
}

/// Accepts RFC 3339 as well as Go's `time.Time` string form, e.g.
/// `2018-07-17 20:15:40.752561974 +0000 UTC`, possibly followed by a
/// monotonic clock reading (`m=+12.3`).
pub fn parse_timestamp(raw: &str) -> KubeResult<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts);
    }

    // date, time, numeric offset; the zone abbreviation is redundant.
    let head: Vec<&str> = raw.split_whitespace().take(3).collect();
    if head.len() == 3 {
        let joined = head.join(" ");
        if let Ok(ts) = DateTime::parse_from_str(&joined, "%Y-%m-%d %H:%M:%S%.f %z") {
            return Ok(ts);
        }
    }
    Err(KubeError::Healthz(format!("unrecognised timestamp: {raw}")))
}

/// Probe kube-proxy's healthz endpoint at `addr` within `timeout`.
pub async fn probe_healthz(client: &reqwest::Client, addr: SocketAddr, timeout: Duration) -> ProbeResult {
    let url = format!("http://{addr}/healthz");

    let resp = match client.get(&url).timeout(timeout).send().await {
        Ok(resp) => resp,
        Err(e) if e.is_timeout() => {
            debug!(%url, "healthz probe timed out");
            return ProbeResult::Failed;
        }
        Err(e) => {
            debug!(error = %e, %url, "healthz request failed");
            return ProbeResult::Failed;
        }
    };

    let status = resp.status();
    if !status.is_success() {
        debug!(%status, %url, "healthz non-2xx");
        return ProbeResult::Unhealthy;
    }

    let body = match resp.bytes().await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, %url, "healthz body unreadable");
            return ProbeResult::Failed;
        }
    };

    let stale = ProxyHealthz::parse(&body).and_then(|h| {
        let lag = h.lag()?;
        debug!(lag_ms = lag.num_milliseconds(), %url, "kube-proxy rule sync lag");
        h.is_stale(STALE_AFTER)
    });
    match stale {
        Ok(false) => ProbeResult::Healthy,
        Ok(true) => ProbeResult::Unhealthy,
        Err(e) => {
            debug!(error = %e, %url, "healthz body rejected");
            ProbeResult::Failed
        }
    }
}
