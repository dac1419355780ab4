//! Finding the pods scheduled on this node through the API server.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{KubeError, KubeResult};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The parts of a pod the fixers care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub node_name: String,
    pub pod_ip: Option<String>,
}

/// Looks up pods running on the local node.
#[async_trait]
pub trait PodLookup: Send + Sync {
    /// First pod on this node whose name starts with `prefix`.
    async fn find_local_pod(&self, prefix: &str) -> KubeResult<PodInfo>;
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pod {
    metadata: Metadata,
    spec: Spec,
    status: Status,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Metadata {
    name: String,
    namespace: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Spec {
    node_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Status {
    #[serde(rename = "podIP")]
    pod_ip: Option<String>,
}

impl From<Pod> for PodInfo {
    fn from(pod: Pod) -> Self {
        Self {
            name: pod.metadata.name,
            namespace: pod.metadata.namespace,
            node_name: pod.spec.node_name,
            pod_ip: pod.status.pod_ip.filter(|ip| !ip.is_empty()),
        }
    }
}

fn select_pod(pods: Vec<Pod>, prefix: &str, node: &str) -> Option<PodInfo> {
    pods.into_iter()
        .find(|p| p.spec.node_name == node && p.metadata.name.starts_with(prefix))
        .map(PodInfo::from)
}

#[derive(Debug, Clone)]
enum Token {
    /// Re-read per request; projected tokens rotate.
    File(PathBuf),
    Static(String),
}

/// [`PodLookup`] against the API server using the pod's service account.
#[derive(Debug, Clone)]
pub struct InClusterPods {
    client: reqwest::Client,
    api_server: String,
    token: Token,
    node_name: String,
}

impl InClusterPods {
    /// Configure from `KUBERNETES_SERVICE_HOST`/`KUBERNETES_SERVICE_PORT`
    /// and the mounted service account.
    pub fn from_env(node_name: impl Into<String>) -> KubeResult<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| KubeError::MissingEnv("KUBERNETES_SERVICE_HOST"))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT")
            .map_err(|_| KubeError::MissingEnv("KUBERNETES_SERVICE_PORT"))?;
        let api_server = if host.contains(':') {
            format!("https://[{host}]:{port}")
        } else {
            format!("https://{host}:{port}")
        };

        let dir = PathBuf::from(SERVICE_ACCOUNT_DIR);
        let ca_path = dir.join("ca.crt");
        let ca = std::fs::read(&ca_path).map_err(|source| KubeError::Read {
            path: ca_path.display().to_string(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .add_root_certificate(reqwest::Certificate::from_pem(&ca)?)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_server,
            token: Token::File(dir.join("token")),
            node_name: node_name.into(),
        })
    }

    /// Talk to `api_server` with a fixed bearer token.
    pub fn with_token(
        api_server: impl Into<String>,
        token: impl Into<String>,
        node_name: impl Into<String>,
    ) -> KubeResult<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_server: api_server.into(),
            token: Token::Static(token.into()),
            node_name: node_name.into(),
        })
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    async fn bearer(&self) -> KubeResult<String> {
        match &self.token {
            Token::Static(t) => Ok(t.clone()),
            Token::File(path) => tokio::fs::read_to_string(path)
                .await
                .map(|t| t.trim().to_string())
                .map_err(|source| KubeError::Read {
                    path: path.display().to_string(),
                    source,
                }),
        }
    }
}

#[async_trait]
impl PodLookup for InClusterPods {
    async fn find_local_pod(&self, prefix: &str) -> KubeResult<PodInfo> {
        let url = format!("{}/api/v1/pods", self.api_server);
        let selector = format!("spec.nodeName={}", self.node_name);
        debug!(%url, %selector, %prefix, "listing local pods");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.bearer().await?)
            .query(&[("fieldSelector", selector.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(KubeError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let list: PodList = resp.json().await?;
        select_pod(list.items, prefix, &self.node_name).ok_or_else(|| KubeError::PodNotFound {
            prefix: prefix.to_string(),
            node: self.node_name.clone(),
        })
    }
}
