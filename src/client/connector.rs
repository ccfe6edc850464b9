// src/client/connector.rs

//! A single outbound connect attempt with hostname resolution and a timeout.

use crate::config::ClientConfig;
use crate::core::NetError;
use crate::core::metrics;
use crate::core::registry::Admitted;
use crate::core::state::Hub;
use std::net::SocketAddr;
use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, info, warn};

/// Resolves `host:port`, connects to the first address that accepts, and admits
/// the resulting stream into `hub`'s registry.
///
/// There is no retry. On failure the dispatcher's `on_connection_error` fires and
/// the error is returned to the caller.
pub async fn connect(hub: &Hub, config: &ClientConfig) -> Result<Admitted<TcpStream>, NetError> {
    let attempt = tokio::time::timeout(config.connect_timeout, open_stream(config));
    let result = match attempt.await {
        Ok(result) => result,
        Err(_) => Err(NetError::ConnectTimeout {
            host: config.host.clone(),
            port: config.port,
        }),
    };

    let (stream, addr) = match result {
        Ok(connected) => connected,
        Err(err) => {
            warn!(
                "Failed to connect to {}:{}: {}",
                config.host, config.port, err
            );
            hub.dispatcher().on_connection_error(hub, &err).await;
            return Err(err);
        }
    };

    if config.connection.no_delay
        && let Err(e) = stream.set_nodelay(true)
    {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }

    hub.stats().increment_total_connections();
    metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

    match hub.registry().admit(stream, addr) {
        Ok(admitted) => {
            info!(
                "Connected to {} as connection {}.",
                addr,
                admitted.handle.id()
            );
            Ok(admitted)
        }
        Err(rejected) => {
            let err = rejected.error();
            hub.stats().increment_rejected();
            hub.dispatcher().on_connection_error(hub, &err).await;
            Err(err)
        }
    }
}

async fn open_stream(config: &ClientConfig) -> Result<(TcpStream, SocketAddr), NetError> {
    let addrs: Vec<SocketAddr> = lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            debug!("Resolving {}:{} failed: {}", config.host, config.port, e);
            NetError::Resolve {
                host: config.host.clone(),
                port: config.port,
            }
        })?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok((stream, addr)),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(NetError::from(e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| NetError::Resolve {
        host: config.host.clone(),
        port: config.port,
    }))
}
