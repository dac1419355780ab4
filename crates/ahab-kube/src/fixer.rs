//! The network-proxy fixer.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ahab_fixer::{FixError, Fixer, FixerStats};

use crate::error::KubeResult;
use crate::healthz::{probe_healthz, ProbeResult, HEALTHZ_PORT};
use crate::pods::PodLookup;

const PROXY_POD_PREFIX: &str = "kube-proxy";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Watches the node's kube-proxy and counts how often it falls behind.
pub struct KubeProxyFixer {
    pods: Box<dyn PodLookup>,
    http: reqwest::Client,
    stats: Option<Arc<dyn FixerStats>>,
    port: u16,
    probe_timeout: Duration,
}

impl KubeProxyFixer {
    pub fn new(pods: Box<dyn PodLookup>, stats: Option<Arc<dyn FixerStats>>) -> KubeResult<Self> {
        Ok(Self {
            pods,
            // Pod IPs are cluster-internal; never route them through a proxy.
            http: reqwest::Client::builder().no_proxy().build()?,
            stats,
            port: HEALTHZ_PORT,
            probe_timeout: PROBE_TIMEOUT,
        })
    }

    /// Probe a non-default healthz port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn assess(&self) -> bool {
        let pod = match self.pods.find_local_pod(PROXY_POD_PREFIX).await {
            Ok(pod) => pod,
            Err(e) => {
                warn!(error = %e, "kube-proxy lookup failed, assuming healthy");
                return false;
            }
        };

        let Some(ip) = pod.pod_ip.as_deref() else {
            warn!(pod = %pod.name, "kube-proxy has no pod IP yet, assuming healthy");
            return false;
        };
        let ip: IpAddr = match ip.parse() {
            Ok(ip) => ip,
            Err(e) => {
                warn!(pod = %pod.name, %ip, error = %e, "kube-proxy pod IP is invalid, assuming healthy");
                return false;
            }
        };

        let addr = SocketAddr::new(ip, self.port);
        match probe_healthz(&self.http, addr, self.probe_timeout).await {
            ProbeResult::Healthy => false,
            result => {
                warn!(pod = %pod.name, %addr, ?result, "kube-proxy is unhealthy");
                true
            }
        }
    }
}

#[async_trait]
impl Fixer for KubeProxyFixer {
    fn name(&self) -> &str {
        "kube_proxy"
    }

    async fn needs_fixing(&self, cancel: &CancellationToken) -> bool {
        info!("checking kube-proxy health");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            needs = self.assess() => needs,
        }
    }

    async fn fix(&self, _cancel: &CancellationToken) -> Result<(), FixError> {
        info!("kube-proxy is observed only, leaving it alone");
        Ok(())
    }

    fn stats(&self) -> Option<Arc<dyn FixerStats>> {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KubeError, KubeResult};
    use crate::pods::PodInfo;
    use crate::testing::FakeHttp;
    use ahab_fixer::{run_cycle, AtomicStats, CycleOutcome, StatsSnapshot};

    struct StaticPods(Option<String>);

    #[async_trait]
    impl PodLookup for StaticPods {
        async fn find_local_pod(&self, prefix: &str) -> KubeResult<PodInfo> {
            match &self.0 {
                Some(ip) => Ok(PodInfo {
                    name: format!("{prefix}-abc12"),
                    namespace: "kube-system".to_string(),
                    node_name: "node-a".to_string(),
                    pod_ip: Some(ip.clone()),
                }),
                None => Err(KubeError::PodNotFound {
                    prefix: prefix.to_string(),
                    node: "node-a".to_string(),
                }),
            }
        }
    }

    async fn proxy(last: &'static str) -> FakeHttp {
        FakeHttp::start(move |_, _| {
            (
                200,
                format!(
                    r#"{{"lastUpdated":"{last}","currentTime":"2018-07-17 20:15:40.752561974 +0000 UTC"}}"#
                ),
            )
        })
        .await
    }

    fn fixer(pods: StaticPods, port: u16, stats: Arc<AtomicStats>) -> KubeProxyFixer {
        KubeProxyFixer::new(Box::new(pods), Some(stats as Arc<dyn FixerStats>))
            .unwrap()
            .with_port(port)
    }

    #[tokio::test]
    async fn missing_pod_is_assumed_healthy() {
        let stats = Arc::new(AtomicStats::new());
        let f = fixer(StaticPods(None), HEALTHZ_PORT, stats.clone());

        let outcome = run_cycle(&CancellationToken::new(), &f).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Healthy);
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[tokio::test]
    async fn fresh_proxy_is_healthy() {
        let fake = proxy("2018-07-17 20:15:30.000000000 +0000 UTC").await;
        let stats = Arc::new(AtomicStats::new());
        let f = fixer(StaticPods(Some("127.0.0.1".into())), fake.addr().port(), stats);

        assert!(!f.needs_fixing(&CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn stale_proxy_is_counted_and_left_alone() {
        let fake = proxy("2018-07-17 20:14:00.000000000 +0000 UTC").await;
        let stats = Arc::new(AtomicStats::new());
        let f = fixer(StaticPods(Some("127.0.0.1".into())), fake.addr().port(), stats.clone());

        let outcome = run_cycle(&CancellationToken::new(), &f).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Fixed);
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                needs_fixing: 1,
                fixed: 1,
                fix_failed: 0,
            }
        );
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_proxy_needs_fixing() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let f = fixer(StaticPods(Some("127.0.0.1".into())), port, Arc::new(AtomicStats::new()));
        assert!(f.needs_fixing(&CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn cancelled_check_is_healthy() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let f = fixer(
            StaticPods(Some("127.0.0.1".into())),
            1,
            Arc::new(AtomicStats::new()),
        );
        assert!(!f.needs_fixing(&cancel).await);
    }

    #[test]
    fn reports_metric_friendly_name() {
        let f = fixer(StaticPods(None), HEALTHZ_PORT, Arc::new(AtomicStats::new()));
        assert_eq!(f.name(), "kube_proxy");
    }
}
