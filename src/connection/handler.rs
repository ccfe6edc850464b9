// src/connection/handler.rs

//! Defines the `ConnectionHandler` which drives the full lifecycle of one
//! admitted connection: the connect hook, the read loop, and the disconnect path.

use super::guard::ConnectionGuard;
use super::handle::ConnectionHandle;
use super::stream::ByteChannel;
use super::writer;
use crate::core::NetError;
use crate::core::metrics;
use crate::core::registry::Admitted;
use crate::core::state::{ConnectionState, Hub};
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How the read loop ended.
enum Outcome {
    Disconnected,
    Errored(NetError),
}

/// Owns the read half of an admitted channel and the task writing its other half.
pub struct ConnectionHandler<C: ByteChannel> {
    hub: Hub,
    handle: Arc<ConnectionHandle>,
    reader: ReadHalf<C>,
    buffer: BytesMut,
    kill_rx: broadcast::Receiver<()>,
    write_error_rx: mpsc::Receiver<NetError>,
    writer: JoinHandle<()>,
}

impl<C: ByteChannel> ConnectionHandler<C> {
    /// Splits the channel and starts its writer task. Must be called from within
    /// a Tokio runtime.
    pub fn new(hub: Hub, admitted: Admitted<C>) -> Self {
        let Admitted {
            handle,
            channel,
            io,
        } = admitted;
        let (reader, write_half) = tokio::io::split(channel);
        let (error_tx, write_error_rx) = mpsc::channel(1);
        let writer = tokio::spawn(writer::run(
            handle.clone(),
            write_half,
            io.outbox_rx,
            error_tx,
        ));
        let buffer = BytesMut::with_capacity(hub.settings().read_buffer_size);

        Self {
            hub,
            handle,
            reader,
            buffer,
            kill_rx: io.kill_rx,
            write_error_rx,
            writer,
        }
    }

    /// Runs the connection until it reaches a terminal state.
    pub async fn run(mut self) {
        let _guard = ConnectionGuard::new(self.hub.clone(), self.handle.clone());
        let id = self.handle.id();
        let dispatcher = self.hub.dispatcher().clone();

        if !dispatcher.on_client_connected(&self.hub, id).await {
            info!(
                "Connection {} ({}) refused by the application.",
                id,
                self.handle.addr()
            );
            self.handle.transition(ConnectionState::Rejected);
            self.hub.registry().remove(id);
            self.hub.stats().increment_refused();
            metrics::CONNECTIONS_REFUSED_TOTAL.inc();
            self.shutdown_writer().await;
            return;
        }
        self.handle.transition(ConnectionState::Connected);

        let outcome = self.read_loop().await;
        self.finish(outcome).await;
    }

    /// Keeps exactly one read outstanding. The next read is only issued after the
    /// dispatch for the previous one has returned, so reads are delivered in order.
    async fn read_loop(&mut self) -> Outcome {
        let id = self.handle.id();
        let dispatcher = self.hub.dispatcher().clone();
        let read_buffer_size = self.hub.settings().read_buffer_size;

        loop {
            self.handle.transition(ConnectionState::Reading);
            if self.buffer.capacity() < read_buffer_size {
                self.buffer.reserve(read_buffer_size);
            }

            tokio::select! {
                // Prioritize shutdown signals over other events.
                biased;
                _ = self.hub.shutdown_signalled() => {
                    info!("Connection {} received shutdown signal.", id);
                    return Outcome::Disconnected;
                }
                _ = self.kill_rx.recv() => {
                    debug!("Connection {} received kill signal.", id);
                    return Outcome::Disconnected;
                }
                Some(err) = self.write_error_rx.recv() => {
                    return if err.is_peer_close() {
                        Outcome::Disconnected
                    } else {
                        Outcome::Errored(err)
                    };
                }
                result = self.reader.read_buf(&mut self.buffer) => {
                    match result {
                        Ok(0) => {
                            debug!("Connection {} closed by peer.", id);
                            return Outcome::Disconnected;
                        }
                        Ok(n) => {
                            let data = self.buffer.split_to(n).freeze();
                            metrics::BYTES_READ_TOTAL.inc_by(n as f64);
                            self.handle.record_read(data.clone());
                            self.handle.transition(ConnectionState::Dispatching);
                            dispatcher.on_data_received(&self.hub, id, &data).await;
                        }
                        Err(e) => {
                            let err = NetError::from(e);
                            if err.is_peer_close() {
                                debug!("Connection {} closed by peer: {}", id, err);
                                return Outcome::Disconnected;
                            }
                            return Outcome::Errored(err);
                        }
                    }
                }
            }
        }
    }

    /// Deregisters the connection and fires the terminal callbacks. The state
    /// transition acts as the gate, so the callbacks run at most once.
    async fn finish(&mut self, outcome: Outcome) {
        let id = self.handle.id();
        let dispatcher = self.hub.dispatcher().clone();
        self.hub.registry().remove(id);

        let terminal = match outcome {
            Outcome::Disconnected => ConnectionState::Disconnected,
            Outcome::Errored(_) => ConnectionState::Errored,
        };
        if self.handle.transition(terminal) {
            self.hub.stats().increment_disconnected();
            if let Outcome::Errored(err) = &outcome {
                warn!("Connection {} ({}) failed: {}", id, self.handle.addr(), err);
                metrics::TRANSPORT_ERRORS_TOTAL.inc();
                dispatcher.on_data_received_error(&self.hub, id, err).await;
            } else {
                info!("Connection {} ({}) disconnected.", id, self.handle.addr());
            }
            let info = self.handle.info();
            dispatcher.on_disconnected(&self.hub, &info).await;
        }

        self.shutdown_writer().await;
    }

    async fn shutdown_writer(&mut self) {
        self.handle.close_outbox();
        let drain_timeout = self.hub.settings().writer_drain_timeout;
        if tokio::time::timeout(drain_timeout, &mut self.writer)
            .await
            .is_err()
        {
            warn!(
                "Writer for connection {} did not drain within {:?}; aborting it.",
                self.handle.id(),
                drain_timeout
            );
            self.writer.abort();
        }
    }
}
