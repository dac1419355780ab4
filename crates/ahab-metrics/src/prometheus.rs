//! Prometheus text exposition format.
//!
//! Renders every registered fixer counter for scraping by a Prometheus
//! server or compatible agent.

use ::prometheus::{Encoder, TextEncoder};
use tracing::warn;

use crate::registry::FixerMetrics;

/// `Content-Type` of the rendered exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render all counters registered on `metrics`.
///
/// Encoding failures are logged and yield whatever was written so far;
/// a scrape never fails outright.
pub fn render_prometheus(metrics: &FixerMetrics) -> String {
    let families = metrics.registry().gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&families, &mut buf) {
        warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buf).into_owned()
}
