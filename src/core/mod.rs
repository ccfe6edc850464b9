// src/core/mod.rs

//! The central module containing the connection registry, the dispatcher
//! contract, and the shared state of the framework.

pub mod dispatcher;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod state;

pub use dispatcher::EventDispatcher;
pub use errors::NetError;
pub use state::{ConnectionId, ConnectionInfo, ConnectionState, Hub};
