//! ahab-fixer — the health-check-and-remediation engine.
//!
//! A [`Fixer`] answers "is this unhealthy?", knows how to repair it, and
//! exposes its counters. The engine drives fixers without knowing anything
//! about the service behind them.
//!
//! # Architecture
//!
//! ```text
//! Supervisor (one task per fixer, shared CancellationToken)
//!   └── run_forever(fixer, period)
//!       ├── DelayTick (randomized phase, nominal period)
//!       └── run_cycle(fixer) per tick
//!           ├── fixer.needs_fixing()
//!           ├── stats.inc_needs_fixing()
//!           └── fixer.fix() → inc_fixed | inc_fix_failed
//! ```
//!
//! # Retry policy
//!
//! A cycle never retries. A failed repair is counted and the next tick
//! reassesses from scratch; only cancellation ends a scheduler.

pub mod error;
pub mod escalation;
pub mod fixer;
pub mod schedule;
pub mod stats;
pub mod supervisor;

pub use error::{FixError, ScheduleError, SupervisorError};
pub use escalation::{EscalationChain, Remedy};
pub use fixer::{run_cycle, CycleOutcome, Fixer};
pub use schedule::{run_forever, run_with_ticker, DelayTick};
pub use stats::{AtomicStats, FixerStats, NullStats, StatsSnapshot};
pub use supervisor::Supervisor;
