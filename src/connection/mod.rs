// src/connection/mod.rs

//! Manages the lifecycle of a single connection: its shared handle, the reader
//! loop that dispatches events, and the writer task that serializes sends.

mod guard;
mod handle;
mod handler;
mod stream;
mod writer;

pub use guard::ConnectionGuard;
pub use handle::ConnectionHandle;
pub(crate) use handle::ConnectionIo;
pub use handler::ConnectionHandler;
pub use stream::ByteChannel;
