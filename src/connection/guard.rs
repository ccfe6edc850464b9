// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use super::handle::ConnectionHandle;
use crate::core::metrics;
use crate::core::state::{ConnectionState, Hub};
use std::sync::Arc;
use tracing::debug;

/// An RAII guard to ensure a connection is deregistered and its writer released
/// whenever the connection task's scope is exited, including by panic or abort.
pub struct ConnectionGuard {
    hub: Hub,
    handle: Arc<ConnectionHandle>,
}

impl ConnectionGuard {
    pub(crate) fn new(hub: Hub, handle: Arc<ConnectionHandle>) -> Self {
        metrics::CONNECTED_CLIENTS.inc();
        Self { hub, handle }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();

        if self.hub.registry().remove(self.handle.id()).is_some() {
            debug!(
                "Connection {} was still registered when its task ended; removed it.",
                self.handle.id()
            );
        }

        // A task that ended without reaching a terminal state was cancelled or panicked.
        if self.handle.transition(ConnectionState::Errored) {
            debug!(
                "Connection {} ({}) ended abnormally.",
                self.handle.id(),
                self.handle.addr()
            );
        }

        self.handle.close_outbox();
    }
}
