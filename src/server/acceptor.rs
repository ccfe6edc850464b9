// src/server/acceptor.rs

//! The source of inbound channels for the accept loop.

use crate::connection::ByteChannel;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Produces established channels for the accept loop.
///
/// An `Err` from `accept` is treated as fatal to admission: the loop reports it
/// through `on_connection_error` and stops calling `accept`.
#[async_trait]
pub trait Acceptor: Send + 'static {
    type Channel: ByteChannel;

    async fn accept(&mut self) -> io::Result<(Self::Channel, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// The production acceptor: a bound `TcpListener`.
pub struct TcpAcceptor {
    listener: TcpListener,
    no_delay: bool,
}

impl TcpAcceptor {
    pub async fn bind(host: &str, port: u16, no_delay: bool) -> io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self { listener, no_delay })
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    type Channel = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        let (socket, addr) = self.listener.accept().await?;
        if self.no_delay
            && let Err(e) = socket.set_nodelay(true)
        {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }
        Ok((socket, addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
