// src/server/mod.rs

//! The server side: a listener whose accepted connections are admitted into a
//! shared registry and driven by per-connection tasks.

use crate::config::{Config, ServerConfig};
use crate::core::state::Hub;
use crate::core::{EventDispatcher, NetError};
use anyhow::Result;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{error, info};

mod acceptor;
mod connection_loop;
mod context;
mod initialization;
mod metrics_server;

pub use acceptor::{Acceptor, TcpAcceptor};
pub use connection_loop::{REJECTION_MESSAGE, send_rejection};

/// A TCP server. Construct it, `start` it, and either `wait` for it or `stop` it.
pub struct Server {
    config: ServerConfig,
    hub: Hub,
    local_addr: Mutex<Option<SocketAddr>>,
    finished_tx: watch::Sender<bool>,
}

impl Server {
    pub fn new(config: ServerConfig, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        let hub = Hub::new(config.max_clients, config.connection.clone(), dispatcher);
        let (finished_tx, _) = watch::channel(false);
        Self {
            config,
            hub,
            local_addr: Mutex::new(None),
            finished_tx,
        }
    }

    /// Binds the listener and starts accepting on the current Tokio runtime.
    /// Returns the bound address, which is useful when the configured port is `0`.
    pub async fn start(&self) -> Result<SocketAddr, NetError> {
        if self.local_addr.lock().is_some() {
            return Err(NetError::AlreadyStarted);
        }
        let acceptor = initialization::bind(&self.config).await?;
        self.start_with_acceptor(acceptor)
    }

    /// Starts the accept loop over a caller-supplied source of channels instead
    /// of binding `config.host:config.port`.
    pub fn start_with_acceptor<A: Acceptor>(&self, acceptor: A) -> Result<SocketAddr, NetError> {
        let addr = acceptor.local_addr()?;
        {
            let mut slot = self.local_addr.lock();
            if slot.is_some() {
                return Err(NetError::AlreadyStarted);
            }
            *slot = Some(addr);
        }
        let ctx = match initialization::setup(
            &self.config,
            self.hub.clone(),
            acceptor,
            self.finished_tx.clone(),
        ) {
            Ok(ctx) => ctx,
            Err(e) => {
                *self.local_addr.lock() = None;
                return Err(e);
            }
        };
        tokio::spawn(connection_loop::run(ctx));
        Ok(addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Signals shutdown, closes every connection, and waits until the accept
    /// loop and all connection tasks have finished.
    pub async fn stop(&self) -> Result<(), NetError> {
        if self.local_addr().is_none() {
            return Err(NetError::NotStarted);
        }
        info!("Stopping server.");
        self.hub.signal_shutdown();
        self.wait().await
    }

    /// Blocks until the server has shut down.
    pub async fn wait(&self) -> Result<(), NetError> {
        if self.local_addr().is_none() {
            return Err(NetError::NotStarted);
        }
        let mut finished_rx = self.finished_tx.subscribe();
        // The sender lives in `self`, so this can only fail if `self` is gone.
        let _ = finished_rx.wait_for(|finished| *finished).await;
        Ok(())
    }
}

/// Runs a server built from `config` until SIGINT or SIGTERM, then shuts it
/// down gracefully.
pub async fn run(config: Config, dispatcher: Arc<dyn EventDispatcher>) -> Result<()> {
    let server = Server::new(config.server_config(), dispatcher);
    server.start().await?;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        res = server.wait() => {
            if let Err(e) = res {
                error!("Server stopped unexpectedly: {}", e);
            }
            return Ok(());
        }
    }

    server.stop().await?;
    Ok(())
}
