//! Minimal Docker Engine API client over the local unix socket.
//!
//! Each call opens a fresh connection, performs one HTTP/1.1 exchange and
//! collects the whole response body. Only the handful of endpoints the
//! health probe needs are covered.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{DockerError, DockerResult};

/// Default Docker daemon socket.
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

const USER_AGENT: &str = concat!("ahabd/", env!("CARGO_PKG_VERSION"));

/// Body of `POST /containers/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    pub image: String,
    pub cmd: Vec<String>,
    pub tty: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WaitResponse {
    status_code: i64,
}

#[derive(Debug, Deserialize)]
struct PullProgress {
    #[serde(default)]
    error: Option<String>,
}

/// Docker Engine API client bound to one socket path.
#[derive(Debug, Clone)]
pub struct DockerClient {
    socket: PathBuf,
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET)
    }
}

impl DockerClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// `docker pull {image}:{tag}`.
    ///
    /// The daemon answers 200 even when the pull fails midway, reporting
    /// the failure inside the progress stream; that stream is scanned too.
    pub async fn image_pull(&self, image: &str, tag: &str) -> DockerResult<()> {
        let path = format!("/images/create?fromImage={image}&tag={tag}");
        let body = self.call(Method::POST, &path, None, "image pull").await?;

        for line in body.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            if let Ok(PullProgress { error: Some(e) }) = serde_json::from_slice(line) {
                return Err(DockerError::Pull(e));
            }
        }
        Ok(())
    }

    /// `docker create`, returning the new container id.
    pub async fn container_create(&self, config: &ContainerConfig) -> DockerResult<String> {
        let payload = serde_json::to_vec(config).map_err(|source| DockerError::Decode {
            op: "create container",
            source,
        })?;
        let body = self
            .call(Method::POST, "/containers/create", Some(payload), "create container")
            .await?;
        let created: CreateResponse =
            serde_json::from_slice(&body).map_err(|source| DockerError::Decode {
                op: "create container",
                source,
            })?;
        Ok(created.id)
    }

    pub async fn container_start(&self, id: &str) -> DockerResult<()> {
        let path = format!("/containers/{id}/start");
        self.call(Method::POST, &path, None, "start container").await?;
        Ok(())
    }

    /// Block until the container exits and return its exit code.
    pub async fn container_wait(&self, id: &str) -> DockerResult<i64> {
        let path = format!("/containers/{id}/wait");
        let body = self.call(Method::POST, &path, None, "wait container").await?;
        let waited: WaitResponse =
            serde_json::from_slice(&body).map_err(|source| DockerError::Decode {
                op: "wait container",
                source,
            })?;
        Ok(waited.status_code)
    }

    /// Stdout of a container started with a TTY (no stream multiplexing).
    pub async fn container_logs(&self, id: &str) -> DockerResult<String> {
        let path = format!("/containers/{id}/logs?stdout=1");
        let body = self.call(Method::GET, &path, None, "container logs").await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn container_remove(&self, id: &str, force: bool) -> DockerResult<()> {
        let path = format!("/containers/{id}?force={force}");
        self.call(Method::DELETE, &path, None, "remove container").await?;
        Ok(())
    }

    /// One request, failing on any non-2xx status.
    async fn call(
        &self,
        method: Method,
        path: &str,
        payload: Option<Vec<u8>>,
        op: &'static str,
    ) -> DockerResult<Bytes> {
        let (status, body) = self.request(method, path, payload).await?;
        if !status.is_success() {
            return Err(DockerError::Status {
                op,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        Ok(body)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<Vec<u8>>,
    ) -> DockerResult<(StatusCode, Bytes)> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|source| DockerError::Connect {
                path: self.socket.display().to_string(),
                source,
            })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "docker connection closed with error");
            }
        });

        let mut builder = http::Request::builder()
            .method(&method)
            .uri(path)
            .header("host", "docker")
            .header("user-agent", USER_AGENT);
        let body = match payload {
            Some(bytes) => {
                builder = builder.header("content-type", "application/json");
                Full::new(Bytes::from(bytes))
            }
            None => Full::new(Bytes::new()),
        };
        let req = builder.body(body)?;

        debug!(%method, %path, "docker api request");
        let resp = sender.send_request(req).await?;
        let status = resp.status();
        let body = resp.into_body().collect().await?.to_bytes();
        Ok((status, body))
    }
}
