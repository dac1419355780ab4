//! The `Fixer` capability and the fix-once cycle.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FixError;
use crate::stats::{FixerStats, NullStats};

/// Anything that can be assessed for health and repaired.
///
/// Implementations are constructed once at startup and live for the whole
/// daemon run. They must honour `cancel`: a long probe or repair is
/// expected to return promptly once the token fires, and should bound
/// itself with its own timeout.
#[async_trait]
pub trait Fixer: Send + Sync {
    /// Short identifier used in logs, e.g. `docker`.
    fn name(&self) -> &str;

    /// Non-mutating health assessment. Probe failures are absorbed here
    /// and mapped to `true` or `false` according to the fixer's policy.
    async fn needs_fixing(&self, cancel: &CancellationToken) -> bool;

    /// Attempt one repair, escalating internally if needed.
    async fn fix(&self, cancel: &CancellationToken) -> Result<(), FixError>;

    /// Counters for this fixer, or `None` when it keeps no telemetry.
    fn stats(&self) -> Option<Arc<dyn FixerStats>>;
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The service was healthy; nothing was touched.
    Healthy,
    /// The service was unhealthy and the repair succeeded.
    Fixed,
}

/// Run one assess-and-repair cycle.
///
/// A healthy result leaves the counters untouched. Otherwise
/// `needs_fixing` is incremented, followed by exactly one of `fixed` or
/// `fix_failed`. The repair error is returned to the caller.
pub async fn run_cycle(
    cancel: &CancellationToken,
    fixer: &dyn Fixer,
) -> Result<CycleOutcome, FixError> {
    if !fixer.needs_fixing(cancel).await {
        debug!(fixer = fixer.name(), "healthy");
        return Ok(CycleOutcome::Healthy);
    }

    let stats: Arc<dyn FixerStats> = fixer.stats().unwrap_or_else(|| Arc::new(NullStats));
    stats.inc_needs_fixing();
    info!(fixer = fixer.name(), "unhealthy, attempting fix");

    match fixer.fix(cancel).await {
        Ok(()) => {
            stats.inc_fixed();
            info!(fixer = fixer.name(), "fixed");
            Ok(CycleOutcome::Fixed)
        }
        Err(e) => {
            stats.inc_fix_failed();
            warn!(fixer = fixer.name(), error = %e, "fix failed");
            Err(e)
        }
    }
}
