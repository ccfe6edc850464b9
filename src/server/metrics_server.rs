// src/server/metrics_server.rs

use crate::core::metrics::{self, gather_metrics};
use crate::core::state::Hub;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use tracing::{error, info};

/// Handles HTTP requests to the /metrics endpoint.
///
/// The connected-clients gauge is refreshed from the registry before gathering,
/// so the endpoint reports the live count even if a guard was leaked.
async fn metrics_handler(hub: Hub) -> impl IntoResponse {
    metrics::CONNECTED_CLIENTS.set(hub.connection_count() as f64);

    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Runs a simple HTTP server to expose Prometheus metrics on /metrics until the
/// hub signals shutdown.
pub async fn run_metrics_server(hub: Hub, port: u16) {
    let shutdown_hub = hub.clone();
    let app = Router::new().route("/metrics", get(move || metrics_handler(hub.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server on port {}: {}", port, e);
            return;
        }
    };
    info!(
        "Prometheus metrics server listening on http://{}/metrics",
        addr
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_hub.shutdown_signalled().await;
            info!("Metrics server shutting down.");
        })
        .await;
    if let Err(e) = served {
        error!("Metrics server failed: {}", e);
    }
}
