// src/connection/stream.rs

use tokio::io::{AsyncRead, AsyncWrite};

/// An established, ordered, reliable byte stream to one peer.
///
/// Anything Tokio can read from and write to qualifies: `TcpStream` in
/// production, `tokio::io::DuplexStream` in tests.
pub trait ByteChannel: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ByteChannel for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
