//! Ordered repair strategies.
//!
//! A fixer usually has more than one way to repair its service, ranked
//! from cheap and reversible (restart a unit) to disruptive (ask for a
//! node reboot). [`EscalationChain`] tries them in order and stops at the
//! first one that works.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::FixError;

/// One repair strategy.
#[async_trait]
pub trait Remedy: Send + Sync {
    /// Name used in logs and in [`FixError::RemedyFailed`].
    fn name(&self) -> &str;

    /// Apply the remedy once.
    async fn apply(&self, cancel: &CancellationToken) -> anyhow::Result<()>;
}

/// Remedies in priority order.
pub struct EscalationChain {
    remedies: Vec<Box<dyn Remedy>>,
}

impl EscalationChain {
    pub fn new(remedies: Vec<Box<dyn Remedy>>) -> Self {
        Self { remedies }
    }

    /// Append a remedy after the existing ones.
    pub fn then(mut self, remedy: impl Remedy + 'static) -> Self {
        self.remedies.push(Box::new(remedy));
        self
    }

    pub fn len(&self) -> usize {
        self.remedies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remedies.is_empty()
    }

    /// Try each remedy in order.
    ///
    /// Returns the name of the remedy that succeeded. Intermediate failures
    /// are logged and escalated past; only the last remedy's failure is
    /// returned. A cancelled token stops escalation before the next remedy.
    pub async fn escalate(&self, cancel: &CancellationToken) -> Result<&str, FixError> {
        let Some(last) = self.remedies.len().checked_sub(1) else {
            return Err(FixError::NoRemedies);
        };

        for (i, remedy) in self.remedies.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(remedy = remedy.name(), "escalation cancelled");
                return Err(FixError::Cancelled);
            }

            match remedy.apply(cancel).await {
                Ok(()) => {
                    info!(remedy = remedy.name(), step = i + 1, "remedy succeeded");
                    return Ok(remedy.name());
                }
                Err(e) if i == last => {
                    return Err(FixError::RemedyFailed {
                        remedy: remedy.name().to_string(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(remedy = remedy.name(), error = %e, "remedy failed, escalating");
                }
            }
        }

        Err(FixError::NoRemedies)
    }
}

impl std::fmt::Debug for EscalationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.remedies.iter().map(|r| r.name()))
            .finish()
    }
}
