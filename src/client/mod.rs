// src/client/mod.rs

//! The client side: one outbound connection driven by the same handle, reader
//! loop, and dispatcher contract as a server connection.

pub mod connector;

use crate::config::ClientConfig;
use crate::connection::ConnectionHandler;
use crate::core::state::{ConnectionId, Hub};
use crate::core::{EventDispatcher, NetError};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::error;

/// A connected client.
///
/// The connection's reader runs on the Tokio runtime, and events arrive through
/// the `EventDispatcher` passed to `connect`. The connection counts as a regular
/// entry in the client's own `Hub`, which holds exactly one slot.
pub struct Client {
    hub: Hub,
    id: ConnectionId,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connects to `config.host:config.port`. The `on_client_connected` hook runs
    /// for the new connection before the first read is issued.
    pub async fn connect(
        config: ClientConfig,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Result<Self, NetError> {
        let hub = Hub::new(1, config.connection.clone(), dispatcher);
        let admitted = connector::connect(&hub, &config).await?;
        let id = admitted.handle.id();
        let handler = ConnectionHandler::new(hub.clone(), admitted);
        let task = tokio::spawn(handler.run());
        Ok(Self {
            hub,
            id,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn is_connected(&self) -> bool {
        self.hub.registry().contains(self.id)
    }

    /// Queues `payload` without waiting for delivery.
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<(), NetError> {
        self.hub.send_to(self.id, payload)
    }

    pub fn send_str(&self, message: &str) -> Result<(), NetError> {
        self.hub.send_str(self.id, message)
    }

    /// Sends `payload` and waits until every byte has been written.
    pub async fn write(&self, payload: impl Into<Bytes>) -> Result<usize, NetError> {
        self.hub.write_to(self.id, payload).await
    }

    /// The bytes delivered by the most recent read.
    pub fn read_buffer(&self) -> Result<Bytes, NetError> {
        self.hub.read_buffer(self.id)
    }

    /// Closes the connection. `on_disconnected` fires on the connection's task.
    pub fn disconnect(&self) -> bool {
        self.hub.disconnect(self.id)
    }

    /// Blocks until the connection has finished, whichever side closed it.
    pub async fn wait(&self) {
        // Concurrent waiters queue on the lock and return once the first one is done.
        let mut task = self.task.lock().await;
        if let Some(handle) = task.as_mut()
            && let Err(e) = handle.await
            && e.is_panic()
        {
            error!("Client connection task panicked: {e:?}");
        }
        *task = None;
    }
}
