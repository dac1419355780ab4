//! The container-runtime fixer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ahab_fixer::{EscalationChain, FixError, Fixer, FixerStats};

use crate::client::DockerClient;
use crate::remedy::{RebootSentinel, SystemdRestart};
use crate::runner::{ContainerRunner, HelloWorldRunner};

/// Upper bound on one health probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Time a stopped probe gets to remove its container before it is dropped.
pub const CLEANUP_GRACE: Duration = Duration::from_secs(15);

const DOCKER_UNIT: &str = "docker.service";

/// Keeps the local Docker daemon able to run containers.
pub struct DockerFixer {
    runner: Box<dyn ContainerRunner>,
    chain: EscalationChain,
    stats: Option<Arc<dyn FixerStats>>,
    probe_timeout: Duration,
}

impl DockerFixer {
    /// Production wiring: probe the default socket, restart
    /// `docker.service`, then request a reboot.
    pub fn new(stats: Arc<dyn FixerStats>) -> Self {
        let chain = EscalationChain::new(Vec::new())
            .then(SystemdRestart::new(DOCKER_UNIT))
            .then(RebootSentinel::new("docker"));
        Self::with_parts(
            Box::new(HelloWorldRunner::new(DockerClient::default())),
            chain,
            Some(stats),
        )
    }

    pub fn with_parts(
        runner: Box<dyn ContainerRunner>,
        chain: EscalationChain,
        stats: Option<Arc<dyn FixerStats>>,
    ) -> Self {
        Self {
            runner,
            chain,
            stats,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

#[async_trait]
impl Fixer for DockerFixer {
    fn name(&self) -> &str {
        "docker"
    }

    async fn needs_fixing(&self, cancel: &CancellationToken) -> bool {
        info!("checking docker daemon health");

        let probe_cancel = cancel.child_token();
        let probe = self.runner.run(&probe_cancel);
        tokio::pin!(probe);

        let unhealthy = tokio::select! {
            biased;
            res = &mut probe => {
                return match res {
                    Ok(()) => false,
                    Err(_) if cancel.is_cancelled() => {
                        info!("docker health check interrupted by shutdown");
                        false
                    }
                    Err(e) => {
                        warn!(error = %e, "docker health check failed");
                        true
                    }
                };
            }
            _ = cancel.cancelled() => {
                info!("docker health check interrupted by shutdown");
                false
            }
            _ = tokio::time::sleep(self.probe_timeout) => {
                warn!(timeout = ?self.probe_timeout, "docker health check timed out");
                true
            }
        };

        probe_cancel.cancel();
        if tokio::time::timeout(CLEANUP_GRACE, probe).await.is_err() {
            warn!(grace = ?CLEANUP_GRACE, "docker probe did not clean up in time, abandoning it");
        }
        unhealthy
    }

    async fn fix(&self, cancel: &CancellationToken) -> Result<(), FixError> {
        let remedy = self.chain.escalate(cancel).await?;
        info!(%remedy, "docker daemon repaired");
        Ok(())
    }

    fn stats(&self) -> Option<Arc<dyn FixerStats>> {
        self.stats.clone()
    }
}
