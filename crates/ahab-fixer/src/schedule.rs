//! Jittered periodic scheduling of fix cycles.
//!
//! Each scheduler waits a random initial delay in `[period/2, 3*period/2)`
//! before its first tick, then ticks every `period`. Fixers started at the
//! same moment, on one node or across a fleet, therefore do not probe
//! their services in lockstep.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ScheduleError;
use crate::fixer::{run_cycle, Fixer};

/// Periodic trigger with a randomized phase.
#[derive(Debug)]
pub struct DelayTick {
    period: Duration,
    initial_delay: Duration,
    interval: Interval,
}

impl DelayTick {
    /// Create a ticker seeded from OS entropy.
    pub fn new(period: Duration) -> Result<Self, ScheduleError> {
        Self::with_rng(period, &mut StdRng::from_entropy())
    }

    /// Create a ticker drawing its phase from `rng`.
    pub fn with_rng<R: Rng>(period: Duration, rng: &mut R) -> Result<Self, ScheduleError> {
        if period.is_zero() {
            return Err(ScheduleError::InvalidPeriod);
        }
        let initial_delay = period / 2 + period.mul_f64(rng.gen_range(0.0..1.0));
        let mut interval = tokio::time::interval_at(Instant::now() + initial_delay, period);
        // A slow cycle pushes the schedule back instead of bursting.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self {
            period,
            initial_delay,
            interval,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Run `fixer` on a jittered interval until `cancel` fires.
///
/// Never returns because of a fixer error; the only terminal outcomes are
/// [`ScheduleError::Cancelled`] and [`ScheduleError::InvalidPeriod`].
pub async fn run_forever(
    cancel: CancellationToken,
    fixer: Arc<dyn Fixer>,
    period: Duration,
) -> Result<(), ScheduleError> {
    run_with_ticker(cancel, fixer, DelayTick::new(period)?).await
}

/// Run `fixer` on every tick of `ticker` until `cancel` fires.
///
/// Cycles for one fixer never overlap: the next tick is only awaited once
/// the current cycle has returned. An in-flight cycle is abandoned when
/// the token fires.
pub async fn run_with_ticker(
    cancel: CancellationToken,
    fixer: Arc<dyn Fixer>,
    mut ticker: DelayTick,
) -> Result<(), ScheduleError> {
    info!(
        fixer = fixer.name(),
        period = ?ticker.period(),
        initial_delay = ?ticker.initial_delay(),
        "scheduler started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(fixer = fixer.name(), "cycle abandoned on cancellation");
                break;
            }
            result = run_cycle(&cancel, fixer.as_ref()) => {
                match result {
                    Ok(outcome) => debug!(fixer = fixer.name(), ?outcome, "cycle complete"),
                    Err(e) => warn!(fixer = fixer.name(), error = %e, "cycle failed, retrying next tick"),
                }
            }
        }
    }

    info!(fixer = fixer.name(), "scheduler stopped");
    Err(ScheduleError::Cancelled)
}
