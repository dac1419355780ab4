//! Daemon wiring: signals, counters, fixers and the supervisor.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ahab_docker::DockerFixer;
use ahab_fixer::Supervisor;
use ahab_kube::{InClusterPods, KubeProxyFixer};
use ahab_metrics::FixerMetrics;

use crate::config::DaemonConfig;
use crate::metrics_server;

/// Prometheus subsystem every exported counter is registered under.
pub const METRICS_SOURCE: &str = "ahabd";

/// Run until SIGINT or SIGTERM.
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));
    run_until(config, cancel).await
}

/// Run until `cancel` fires or a supervised task fails.
///
/// Cancellation is a clean exit; any other terminal error is returned.
pub async fn run_until(config: DaemonConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    info!(
        node = %config.node_id,
        period = ?config.period,
        metrics_addr = %config.metrics_addr,
        "starting fixers"
    );

    let metrics = FixerMetrics::new();
    let docker_stats = metrics.register(METRICS_SOURCE, "docker")?;
    let kube_stats = metrics.register(METRICS_SOURCE, "kube_proxy")?;

    let mut supervisor = Supervisor::new(cancel.clone());
    supervisor.spawn_fixer(Arc::new(DockerFixer::new(docker_stats)), config.period);

    let kube_proxy = InClusterPods::from_env(config.node_id.as_str())
        .and_then(|pods| KubeProxyFixer::new(Box::new(pods), Some(kube_stats)));
    match kube_proxy {
        Ok(fixer) => supervisor.spawn_fixer(Arc::new(fixer), config.period),
        Err(e) => warn!(error = %e, "kubernetes API unavailable, not watching kube-proxy"),
    }

    supervisor.spawn(
        "metrics",
        metrics_server::serve(config.metrics_addr, metrics, cancel.clone()),
    );

    match supervisor.wait().await {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancellation() => {
            info!("all fixers stopped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => Some(term),
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            None
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for SIGINT");
                return;
            }
            info!("received SIGINT, shutting down");
        }
        Some(_) = async { term.as_mut()?.recv().await } => {
            info!("received SIGTERM, shutting down");
        }
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(addr: std::net::SocketAddr) -> DaemonConfig {
        DaemonConfig {
            node_id: "node-a".to_string(),
            metrics_addr: addr,
            period: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn cancellation_is_a_clean_exit() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = run_until(config("127.0.0.1:0".parse().unwrap()), cancel).await;
        assert!(res.is_ok(), "{res:?}");
    }

    #[tokio::test]
    async fn metrics_bind_failure_stops_the_daemon() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let cancel = CancellationToken::new();

        let err = run_until(config(taken.local_addr().unwrap()), cancel.clone())
            .await
            .unwrap_err();
        assert!(cancel.is_cancelled());
        assert!(format!("{err:#}").contains("bind metrics listener"), "{err:#}");
    }
}
