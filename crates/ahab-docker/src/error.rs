//! Docker client and probe errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("connect to {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("{op} failed: {status} - {body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },

    #[error("image pull failed: {0}")]
    Pull(String),

    #[error("decode {op} response: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("container exited with status {0}")]
    ExitStatus(i64),

    #[error("expected [{expected}] got [{actual}]")]
    UnexpectedOutput { expected: String, actual: String },

    #[error("probe cancelled")]
    Cancelled,
}

pub type DockerResult<T> = Result<T, DockerError>;
