// src/server/initialization.rs

//! Handles server initialization: validating settings, binding the listener,
//! and spawning auxiliary tasks.

use super::acceptor::{Acceptor, TcpAcceptor};
use super::context::ServerContext;
use super::metrics_server;
use crate::config::ServerConfig;
use crate::core::NetError;
use crate::core::state::Hub;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::info;

/// Validates the configuration and binds the TCP listener it names.
pub async fn bind(config: &ServerConfig) -> Result<TcpAcceptor, NetError> {
    config.validate()?;
    let acceptor =
        TcpAcceptor::bind(&config.host, config.port, config.connection.no_delay).await?;
    Ok(acceptor)
}

/// Prepares everything the accept loop needs around an already bound acceptor.
pub fn setup<A: Acceptor>(
    config: &ServerConfig,
    hub: Hub,
    acceptor: A,
    finished_tx: watch::Sender<bool>,
) -> Result<ServerContext<A>, NetError> {
    config.validate()?;
    log_startup_info(config);
    info!("Server listening on {}", acceptor.local_addr()?);

    let mut background_tasks = JoinSet::new();
    if config.metrics.enabled {
        let metrics_hub = hub.clone();
        let port = config.metrics.port;
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(metrics_hub, port).await;
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    Ok(ServerContext {
        hub,
        acceptor,
        finished_tx,
        background_tasks,
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &ServerConfig) {
    info!(
        "Server configured for at most {} concurrent clients.",
        config.max_clients
    );
    info!(
        "Read buffer size: {} bytes, TCP_NODELAY: {}.",
        config.connection.read_buffer_size, config.connection.no_delay
    );
}
