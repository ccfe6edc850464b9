// src/core/state/client.rs

//! Contains identity and metadata types for registered connections.

use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroU64;
use std::time::Instant;

/// The identity the registry assigns to an admitted connection.
///
/// IDs are strictly increasing and never reused for the lifetime of a registry.
/// Zero is reserved as the "no client" sentinel, which is why the inner value is
/// a `NonZeroU64`; APIs that accept an optional exclusion take `Option<ConnectionId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(NonZeroU64);

impl ConnectionId {
    /// Builds an ID from a raw value, returning `None` for the reserved sentinel `0`.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl From<NonZeroU64> for ConnectionId {
    fn from(raw: NonZeroU64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point-in-time copy of a connection's metadata, safe to hold after the
/// connection itself has gone away.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub created: Instant,
    pub last_activity: Instant,
    pub bytes_read_total: u64,
    pub bytes_written_total: u64,
    pub state: super::ConnectionState,
}
