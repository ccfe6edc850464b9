// src/core/registry.rs

//! The concurrent connection registry: identity assignment, capacity enforcement,
//! and the map from `ConnectionId` to the live `ConnectionHandle`.
//!
//! Every access to the map happens under a single `parking_lot::Mutex`. The lock
//! is only ever held for the map operation itself; it is never held across an
//! `.await` or while calling into an `EventDispatcher`. Iteration works on a copied
//! snapshot of the handles so callers can do I/O without blocking admission.

use crate::connection::{ConnectionHandle, ConnectionIo};
use crate::core::NetError;
use crate::core::state::ConnectionId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::num::NonZeroU64;
use std::sync::Arc;
use tracing::{debug, error};

/// A channel that passed admission, together with its freshly registered handle.
pub struct Admitted<C> {
    pub handle: Arc<ConnectionHandle>,
    pub channel: C,
    pub(crate) io: ConnectionIo,
}

/// A channel that was turned away at capacity. The channel is handed back so the
/// caller can tell the peer why before dropping it.
pub struct Rejected<C> {
    pub channel: C,
    pub addr: SocketAddr,
    pub limit: usize,
}

impl<C> Rejected<C> {
    pub fn error(&self) -> NetError {
        NetError::ServerFull { limit: self.limit }
    }
}

#[derive(Debug)]
struct RegistryInner {
    connections: BTreeMap<ConnectionId, Arc<ConnectionHandle>>,
    /// The next ID to hand out. `None` once the ID space is exhausted.
    next_id: Option<NonZeroU64>,
}

/// Maps connection IDs to their handles and owns ID allocation.
#[derive(Debug)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
    max_clients: usize,
}

impl ConnectionRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                connections: BTreeMap::new(),
                next_id: Some(NonZeroU64::MIN),
            }),
            max_clients,
        }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Admits a channel if there is room, assigning it the next unused ID.
    ///
    /// The capacity check, the ID allocation and the insert all happen under one
    /// lock acquisition, so two concurrent admissions can never both take the last
    /// slot. The ID counter only moves forward, even after removals.
    pub fn admit<C>(&self, channel: C, addr: SocketAddr) -> Result<Admitted<C>, Rejected<C>> {
        let mut inner = self.inner.lock();
        if inner.connections.len() >= self.max_clients {
            return Err(Rejected {
                channel,
                addr,
                limit: self.max_clients,
            });
        }
        let Some(raw) = inner.next_id else {
            error!("Connection ID space exhausted; rejecting {}", addr);
            return Err(Rejected {
                channel,
                addr,
                limit: self.max_clients,
            });
        };
        inner.next_id = raw.checked_add(1);

        let id = ConnectionId::from(raw);
        let (handle, io) = ConnectionHandle::new(id, addr);
        let handle = Arc::new(handle);
        inner.connections.insert(id, handle.clone());
        drop(inner);

        debug!("Registered connection {} from {}", id, addr);
        Ok(Admitted {
            handle,
            channel,
            io,
        })
    }

    /// Looks up a live connection. An unknown ID is an invariant violation on the
    /// caller's side and is reported as an error, never papered over.
    pub fn lookup(&self, id: ConnectionId) -> Result<Arc<ConnectionHandle>, NetError> {
        self.inner
            .lock()
            .connections
            .get(&id)
            .cloned()
            .ok_or(NetError::UnknownConnection(id))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.lock().connections.contains_key(&id)
    }

    /// Removes a connection. Removing an ID that is already gone is a no-op and
    /// returns `None`, so an EOF racing an error path is harmless.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let removed = self.inner.lock().connections.remove(&id);
        if removed.is_some() {
            debug!("Deregistered connection {}", id);
        }
        removed
    }

    /// Copies out every handle except `exclude`, in ascending ID order.
    pub fn snapshot(&self, exclude: Option<ConnectionId>) -> Vec<Arc<ConnectionHandle>> {
        self.inner
            .lock()
            .connections
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(_, handle)| handle.clone())
            .collect()
    }

    /// Invokes `f` on every handle of a snapshot taken at call time, skipping
    /// `exclude`. The lock is released before the first call to `f`.
    pub fn for_each<F>(&self, exclude: Option<ConnectionId>, mut f: F)
    where
        F: FnMut(&Arc<ConnectionHandle>),
    {
        for handle in self.snapshot(exclude) {
            f(&handle);
        }
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.inner.lock().connections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().connections.is_empty()
    }

    /// Removes and returns every registered handle.
    pub fn drain(&self) -> Vec<Arc<ConnectionHandle>> {
        let drained = std::mem::take(&mut self.inner.lock().connections);
        drained.into_values().collect()
    }
}
