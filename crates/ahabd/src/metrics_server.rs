//! `/metrics` HTTP endpoint.

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ahab_metrics::{FixerMetrics, CONTENT_TYPE};

/// Router exposing `GET /metrics`.
pub fn router(metrics: FixerMetrics) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(metrics)
}

async fn scrape(State(metrics): State<FixerMetrics>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        metrics.render(),
    )
}

/// Serve `/metrics` on `addr` until `cancel` fires.
pub async fn serve(addr: SocketAddr, metrics: FixerMetrics, cancel: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind metrics listener on {addr}"))?;
    serve_listener(listener, metrics, cancel).await
}

/// Serve `/metrics` on an already bound listener until `cancel` fires.
///
/// On cancellation the listener stops accepting and in-flight scrapes
/// are allowed to complete before this returns.
pub async fn serve_listener(
    listener: TcpListener,
    metrics: FixerMetrics,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "metrics endpoint listening");

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("metrics server")?;

    info!("metrics endpoint stopped");
    Ok(())
}
