//! Counters sink for fixer telemetry.
//!
//! Every fixer owns three monotonic counters: cycles that needed fixing,
//! successful repairs, and failed repairs. The engine only increments them;
//! reading is left to whatever backs the sink.

use std::sync::atomic::{AtomicU64, Ordering};

/// Telemetry sink implemented by anything that tracks fixer outcomes.
///
/// Implementations must tolerate concurrent increments: a fixer may be
/// shared across more than one scheduler.
pub trait FixerStats: Send + Sync {
    /// A cycle found the service unhealthy and will attempt a repair.
    fn inc_needs_fixing(&self);
    /// The repair attempt succeeded.
    fn inc_fixed(&self);
    /// The repair attempt failed.
    fn inc_fix_failed(&self);
}

/// Discards every increment. Used when a fixer exposes no counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl FixerStats for NullStats {
    fn inc_needs_fixing(&self) {}

    fn inc_fixed(&self) {}

    fn inc_fix_failed(&self) {}
}

/// In-memory counters backed by atomics.
#[derive(Debug, Default)]
pub struct AtomicStats {
    needs_fixing: AtomicU64,
    fixed: AtomicU64,
    fix_failed: AtomicU64,
}

/// Point-in-time copy of an [`AtomicStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub needs_fixing: u64,
    pub fixed: u64,
    pub fix_failed: u64,
}

impl AtomicStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            needs_fixing: self.needs_fixing.load(Ordering::Relaxed),
            fixed: self.fixed.load(Ordering::Relaxed),
            fix_failed: self.fix_failed.load(Ordering::Relaxed),
        }
    }
}

impl FixerStats for AtomicStats {
    fn inc_needs_fixing(&self) {
        self.needs_fixing.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_fixed(&self) {
        self.fixed.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_fix_failed(&self) {
        self.fix_failed.fetch_add(1, Ordering::Relaxed);
    }
}
