//! ahab-metrics — exported counters for fixers.
//!
//! Every fixer gets three monotonic counters registered on an explicit
//! [`prometheus::Registry`] owned by [`FixerMetrics`]. Nothing touches the
//! process-global default registry.
//!
//! # Architecture
//!
//! ```text
//! FixerMetrics (Registry handle, cloneable)
//!   ├── register(source, name) → Arc<PrometheusStats>   (idempotent)
//!   │     ├── {source}_{name}_restarts
//!   │     ├── {source}_{name}_fixed
//!   │     └── {source}_{name}_fix_failed
//!   └── render() → text/plain for /metrics
//! ```

pub mod prometheus;
pub mod registry;

pub use crate::prometheus::{render_prometheus, CONTENT_TYPE};
pub use crate::registry::{FixerMetrics, MetricsError, PrometheusStats};
