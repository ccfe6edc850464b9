// src/server/connection_loop.rs

//! Contains the accept loop: admitting connections under the capacity limit,
//! supervising connection tasks, and winding everything down on shutdown.

use super::acceptor::Acceptor;
use super::context::ServerContext;
use crate::connection::{ByteChannel, ConnectionHandler};
use crate::core::NetError;
use crate::core::metrics;
use crate::core::registry::Rejected;
use crate::core::state::Hub;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The notice sent to a peer that is turned away because the server is full.
pub const REJECTION_MESSAGE: &str =
    "ERR the server has reached its maximum number of allowed clients, disconnecting\r\n";

/// Upper bound on how long a rejected peer may stall the rejection notice.
const REJECTION_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// The accept loop. It re-arms after every accepted connection, admitted or
/// rejected, and keeps supervising existing connections even if accepting fails.
pub async fn run<A: Acceptor>(mut ctx: ServerContext<A>) {
    let hub = ctx.hub.clone();
    let mut client_tasks = JoinSet::new();
    let mut accepting = true;

    loop {
        tokio::select! {
            biased;

            _ = hub.shutdown_signalled() => {
                info!("Shutdown signalled, no longer accepting connections.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(()) => warn!("A background task finished unexpectedly."),
                    Err(e) => error!("A background task panicked: {e:?}"),
                }
            }

            res = ctx.acceptor.accept(), if accepting => {
                match res {
                    Ok((socket, addr)) => {
                        info!("Accepted new connection from: {}", addr);
                        handle_accepted(&hub, socket, addr, &mut client_tasks);
                    }
                    Err(e) => {
                        // Existing connections keep running; only admission stops.
                        error!("Failed to accept connection: {}. The acceptor is stopping.", e);
                        accepting = false;
                        let err = NetError::AcceptorStopped(e.to_string());
                        hub.dispatcher().on_connection_error(&hub, &err).await;
                    }
                }
            }

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A connection task panicked: {e:?}");
                }
            }
        }
    }

    drop(ctx.acceptor);
    info!("Listener closed. Waiting for connections to finish...");

    // Nothing is admitted any more. Evict everything at once so broadcasts
    // issued during wind-down are refused instead of reaching closing peers.
    for handle in hub.registry().drain() {
        handle.close();
    }

    let shutdown_timeout = hub.settings().shutdown_timeout;
    if tokio::time::timeout(shutdown_timeout, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!(
            "Timed out after {:?} waiting for connections to close; aborting the rest.",
            shutdown_timeout
        );
        client_tasks.shutdown().await;
    }
    info!("All client connections closed.");

    ctx.background_tasks.shutdown().await;
    let _ = ctx.finished_tx.send_replace(true);
    info!("Server shutdown complete.");
}

fn handle_accepted<C: ByteChannel>(
    hub: &Hub,
    channel: C,
    addr: SocketAddr,
    client_tasks: &mut JoinSet<()>,
) {
    hub.stats().increment_total_connections();
    metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

    match hub.registry().admit(channel, addr) {
        Ok(admitted) => {
            info!(
                "Admitted connection {} from {} ({}/{} clients).",
                admitted.handle.id(),
                addr,
                hub.registry().len(),
                hub.registry().max_clients()
            );
            let handler = ConnectionHandler::new(hub.clone(), admitted);
            client_tasks.spawn(handler.run());
        }
        Err(rejected) => {
            warn!(
                "Max clients limit ({}) reached, rejecting {}.",
                rejected.limit, addr
            );
            hub.stats().increment_rejected();
            metrics::CONNECTIONS_REJECTED_TOTAL.inc();
            client_tasks.spawn(send_rejection(rejected));
        }
    }
}

/// Tells a rejected peer why it is being dropped, then closes its channel.
pub async fn send_rejection<C: ByteChannel>(rejected: Rejected<C>) {
    let Rejected {
        mut channel, addr, ..
    } = rejected;
    let notify = async {
        channel.write_all(REJECTION_MESSAGE.as_bytes()).await?;
        channel.flush().await?;
        channel.shutdown().await
    };
    match tokio::time::timeout(REJECTION_WRITE_TIMEOUT, notify).await {
        Ok(Ok(())) => debug!("Sent rejection notice to {}.", addr),
        Ok(Err(e)) => debug!("Failed to send rejection notice to {}: {}", addr, e),
        Err(_) => debug!("Timed out sending rejection notice to {}.", addr),
    }
}
