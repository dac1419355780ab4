//! Errors for pod lookup and health probing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubeError {
    #[error("not running in a cluster: {0} is not set")]
    MissingEnv(&'static str),

    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("api client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("api server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("a pod with prefix ({prefix}) does not exist on node {node}")]
    PodNotFound { prefix: String, node: String },

    #[error("pod {0} has no IP assigned")]
    NoPodIp(String),

    #[error("invalid healthz body: {0}")]
    Healthz(String),
}

pub type KubeResult<T> = Result<T, KubeError>;
