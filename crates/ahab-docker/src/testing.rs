//! In-process fake Docker daemon for tests.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Method, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tempfile::TempDir;
use tokio::net::UnixListener;

type Handler = dyn Fn(&Method, &str) -> (u16, String) + Send + Sync;

/// Serves canned responses on a unix socket and records `METHOD path`.
///
/// A stalled path is recorded but never answered, like a wedged daemon.
pub(crate) struct FakeDocker {
    socket: PathBuf,
    requests: Arc<Mutex<Vec<String>>>,
    _dir: TempDir,
}

impl FakeDocker {
    pub(crate) async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Method, &str) -> (u16, String) + Send + Sync + 'static,
    {
        Self::serve(handler, None).await
    }

    pub(crate) async fn start_stalling<F>(handler: F, stall: &str) -> Self
    where
        F: Fn(&Method, &str) -> (u16, String) + Send + Sync + 'static,
    {
        Self::serve(handler, Some(stall.to_string())).await
    }

    async fn serve<F>(handler: F, stall: Option<String>) -> Self
    where
        F: Fn(&Method, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let stall: Arc<Option<String>> = Arc::new(stall);
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let handler: Arc<Handler> = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                let stall = Arc::clone(&stall);
                tokio::spawn(async move {
                    let svc = service_fn(move |req: http::Request<Incoming>| {
                        let handler = Arc::clone(&handler);
                        let log = Arc::clone(&log);
                        let stall = Arc::clone(&stall);
                        async move {
                            let target = req
                                .uri()
                                .path_and_query()
                                .map(|pq| pq.as_str().to_string())
                                .unwrap_or_default();
                            log.lock().unwrap().push(format!("{} {}", req.method(), target));
                            if stall.as_deref() == Some(target.as_str()) {
                                std::future::pending::<()>().await;
                            }
                            let (status, body) = handler(req.method(), &target);
                            let resp = Response::builder()
                                .status(status)
                                .body(Full::new(Bytes::from(body)))
                                .unwrap();
                            Ok::<_, Infallible>(resp)
                        }
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Self {
            socket,
            requests,
            _dir: dir,
        }
    }

    pub(crate) fn socket(&self) -> &Path {
        &self.socket
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}
