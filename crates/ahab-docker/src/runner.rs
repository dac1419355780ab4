//! Representative workload used as the container-runtime health probe.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{ContainerConfig, DockerClient};
use crate::error::{DockerError, DockerResult};

const PROBE_IMAGE: &str = "docker.io/library/alpine";
const PROBE_TAG: &str = "latest";
const PROBE_OUTPUT: &str = "hello world";

/// Runs a workload and verifies its observable output.
///
/// Once `cancel` fires the runner stops waiting on the daemon, cleans up
/// whatever it created and returns [`DockerError::Cancelled`].
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    async fn run(&self, cancel: &CancellationToken) -> DockerResult<()>;
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = DockerResult<T>>,
) -> DockerResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DockerError::Cancelled),
        res = call => res,
    }
}

/// Pulls alpine, runs `echo hello world` in it and checks the logs.
#[derive(Debug, Clone)]
pub struct HelloWorldRunner {
    client: DockerClient,
    image: String,
    tag: String,
}

impl HelloWorldRunner {
    pub fn new(client: DockerClient) -> Self {
        Self {
            client,
            image: PROBE_IMAGE.to_string(),
            tag: PROBE_TAG.to_string(),
        }
    }

    /// Probe with a different image, e.g. one from a local mirror.
    pub fn with_image(mut self, image: impl Into<String>, tag: impl Into<String>) -> Self {
        self.image = image.into();
        self.tag = tag.into();
        self
    }

    async fn exercise(&self, id: &str) -> DockerResult<()> {
        info!(%id, "docker start");
        self.client.container_start(id).await?;

        info!(%id, "docker wait");
        let status = self.client.container_wait(id).await?;
        if status != 0 {
            return Err(DockerError::ExitStatus(status));
        }

        info!(%id, "docker logs");
        let logs = self.client.container_logs(id).await?;
        let actual = logs.trim();
        if actual != PROBE_OUTPUT {
            return Err(DockerError::UnexpectedOutput {
                expected: PROBE_OUTPUT.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRunner for HelloWorldRunner {
    async fn run(&self, cancel: &CancellationToken) -> DockerResult<()> {
        info!(image = %self.image, tag = %self.tag, "docker pull");
        until_cancelled(cancel, self.client.image_pull(&self.image, &self.tag)).await?;

        info!(image = %self.image, "docker create 'echo hello world'");
        let config = ContainerConfig {
            image: format!("{}:{}", self.image, self.tag),
            cmd: vec!["echo".to_string(), PROBE_OUTPUT.to_string()],
            tty: true,
        };
        let id = until_cancelled(cancel, self.client.container_create(&config)).await?;

        // From here on the container exists and must be removed whatever
        // happens, including cancellation.
        if let Err(e) = until_cancelled(cancel, self.exercise(&id)).await {
            warn!(%id, error = %e, "probe failed, force removing container");
            if let Err(rm) = self.client.container_remove(&id, true).await {
                warn!(%id, error = %rm, "failed to remove probe container");
            }
            return Err(e);
        }

        info!(%id, "docker rm");
        self.client.container_remove(&id, false).await?;
        info!("done running a container");
        Ok(())
    }
}
