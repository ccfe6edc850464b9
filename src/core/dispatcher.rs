// src/core/dispatcher.rs

//! The application hook point. An `EventDispatcher` is injected at construction
//! and invoked by the connection core on every lifecycle transition.

use crate::core::NetError;
use crate::core::state::{ConnectionId, ConnectionInfo, Hub};
use async_trait::async_trait;

/// Callbacks for connection lifecycle events.
///
/// Callbacks for one connection run on that connection's task, one at a time,
/// and the next read is not issued until `on_data_received` returns. The registry
/// lock is never held while a callback runs, so a callback may freely call back
/// into the `Hub` (for example to broadcast from `on_data_received`).
///
/// After `on_disconnected` has fired for an ID, no further callback for that ID
/// occurs. A connection refused through `on_client_connected` gets no further
/// callbacks at all.
#[async_trait]
pub trait EventDispatcher: Send + Sync + 'static {
    /// Called once a connection has been admitted and registered. Returning
    /// `false` refuses it: the connection is evicted and closed.
    async fn on_client_connected(&self, hub: &Hub, id: ConnectionId) -> bool {
        let _ = (hub, id);
        true
    }

    /// Called once per completed read. `data` is the same buffer that
    /// `Hub::read_buffer(id)` returns until the next read completes.
    async fn on_data_received(&self, hub: &Hub, id: ConnectionId, data: &[u8]);

    /// Called when a read or write on the connection failed with a transport
    /// error. The connection is evicted and `on_disconnected` follows.
    async fn on_data_received_error(&self, hub: &Hub, id: ConnectionId, error: &NetError) {
        let _ = (hub, id, error);
    }

    /// Terminal notification, fired exactly once per accepted connection after it
    /// has been removed from the registry. `info` is the connection's final snapshot.
    async fn on_disconnected(&self, hub: &Hub, info: &ConnectionInfo) {
        let _ = (hub, info);
    }

    /// Called for failures not tied to an admitted connection: a failed outbound
    /// connect, or the server's accept loop stopping.
    async fn on_connection_error(&self, hub: &Hub, error: &NetError) {
        let _ = (hub, error);
    }
}
