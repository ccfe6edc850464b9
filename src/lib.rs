// src/lib.rs

pub mod client;
pub mod config;
pub mod connection;
pub mod core;
pub mod server;

// Re-export the types most applications need.
pub use crate::client::Client;
pub use crate::core::{ConnectionId, ConnectionInfo, EventDispatcher, Hub, NetError};
pub use crate::server::Server;
