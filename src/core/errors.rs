// src/core/errors.rs

//! Defines the primary error type for the connection framework.

use crate::core::state::ConnectionId;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing every failure the connection core can report.
/// `std::io::Error` is wrapped in an `Arc` so the whole enum stays cheaply cloneable,
/// which lets one error be handed to both a dispatcher callback and a waiting writer.
#[derive(Error, Debug, Clone)]
pub enum NetError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// Admission was rejected because the registry is at capacity.
    #[error("Server full: the limit of {limit} connected clients has been reached")]
    ServerFull { limit: usize },

    /// An ID was used that is not (or no longer) registered.
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// A write was issued against a connection that has already been evicted.
    #[error("Connection {0} is closed")]
    Closed(ConnectionId),

    #[error("Timed out connecting to {host}:{port}")]
    ConnectTimeout { host: String, port: u16 },

    #[error("Could not resolve {host}:{port}")]
    Resolve { host: String, port: u16 },

    /// The accept loop failed and no longer admits new connections.
    #[error("Acceptor stopped: {0}")]
    AcceptorStopped(String),

    #[error("Server already started")]
    AlreadyStarted,

    #[error("Server not started")]
    NotStarted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NetError {
    /// Returns true for transport errors that only mean the peer went away.
    pub fn is_peer_close(&self) -> bool {
        matches!(self, NetError::Io(e) if matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionAborted
        ))
    }
}

impl From<std::io::Error> for NetError {
    fn from(e: std::io::Error) -> Self {
        NetError::Io(Arc::new(e))
    }
}
