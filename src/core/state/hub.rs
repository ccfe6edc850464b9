// src/core/state/hub.rs

//! Defines `Hub`, the shared context behind a server or client: the connection
//! registry, the injected dispatcher, statistics, and the shutdown signal.

use super::client::{ConnectionId, ConnectionInfo};
use super::stats::StatsState;
use crate::config::ConnectionConfig;
use crate::connection::ConnectionHandle;
use crate::core::NetError;
use crate::core::dispatcher::EventDispatcher;
use crate::core::registry::ConnectionRegistry;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error};

struct HubInner {
    registry: ConnectionRegistry,
    dispatcher: Arc<dyn EventDispatcher>,
    settings: ConnectionConfig,
    stats: StatsState,
    shutdown_tx: watch::Sender<bool>,
}

/// The shared, cheaply cloneable context passed to every connection task and
/// every dispatcher callback.
///
/// Holding a `Hub` inside the dispatcher creates a reference cycle; dispatchers
/// should rely on the `&Hub` passed to each callback instead.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("registry", &self.inner.registry)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Hub {
    pub fn new(
        max_clients: usize,
        settings: ConnectionConfig,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(HubInner {
                registry: ConnectionRegistry::new(max_clients),
                dispatcher,
                settings,
                stats: StatsState::new(),
                shutdown_tx,
            }),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn dispatcher(&self) -> &Arc<dyn EventDispatcher> {
        &self.inner.dispatcher
    }

    pub fn settings(&self) -> &ConnectionConfig {
        &self.inner.settings
    }

    pub fn stats(&self) -> &StatsState {
        &self.inner.stats
    }

    fn lookup(&self, id: ConnectionId) -> Result<Arc<ConnectionHandle>, NetError> {
        self.inner.registry.lookup(id).inspect_err(|e| {
            error!("Invariant violation: {}", e);
        })
    }

    /// Queues `payload` for connection `id` without waiting for delivery.
    pub fn send_to(&self, id: ConnectionId, payload: impl Into<Bytes>) -> Result<(), NetError> {
        self.lookup(id)?.schedule_write(payload)
    }

    pub fn send_str(&self, id: ConnectionId, message: &str) -> Result<(), NetError> {
        self.send_to(id, Bytes::copy_from_slice(message.as_bytes()))
    }

    /// Sends `payload` to connection `id` and waits until it is fully written.
    pub async fn write_to(
        &self,
        id: ConnectionId,
        payload: impl Into<Bytes>,
    ) -> Result<usize, NetError> {
        let handle = self.lookup(id)?;
        handle.write(payload).await
    }

    /// Queues `payload` for every connection registered at the time of the call,
    /// except `exclude`. Connections admitted afterwards do not receive it.
    /// Returns the number of connections the payload was queued for.
    pub fn broadcast_except(
        &self,
        payload: impl Into<Bytes>,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let payload = payload.into();
        let mut delivered = 0;
        self.inner.registry.for_each(exclude, |handle| {
            // Cloning `Bytes` only bumps a reference count.
            match handle.schedule_write(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Broadcast skipped connection {}: {}", handle.id(), e),
            }
        });
        delivered
    }

    pub fn broadcast_str(&self, message: &str, exclude: Option<ConnectionId>) -> usize {
        self.broadcast_except(Bytes::copy_from_slice(message.as_bytes()), exclude)
    }

    /// Evicts connection `id` and closes its channel. The connection's own task
    /// then fires `on_disconnected`. Returns `false` if `id` was not registered;
    /// calling this twice is harmless.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        match self.inner.registry.remove(id) {
            Some(handle) => {
                debug!("Evicting connection {} ({}).", id, handle.addr());
                handle.close();
                true
            }
            None => false,
        }
    }

    pub fn read_buffer(&self, id: ConnectionId) -> Result<Bytes, NetError> {
        Ok(self.lookup(id)?.read_buffer())
    }

    pub fn bytes_read(&self, id: ConnectionId) -> Result<usize, NetError> {
        Ok(self.lookup(id)?.bytes_read())
    }

    pub fn info_string(&self, id: ConnectionId) -> Result<String, NetError> {
        Ok(self.lookup(id)?.info_string())
    }

    pub fn connection_info(&self, id: ConnectionId) -> Result<ConnectionInfo, NetError> {
        Ok(self.lookup(id)?.info())
    }

    pub fn connection_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.inner.registry.ids()
    }

    /// Signals every task attached to this hub to shut down.
    pub fn signal_shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Resolves once shutdown has been signalled, including when it was signalled
    /// before this call.
    pub async fn shutdown_signalled(&self) {
        let mut rx = self.inner.shutdown_tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
