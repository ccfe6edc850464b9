// src/connection/handle.rs

//! Defines `ConnectionHandle`, the shared per-connection object held by the
//! registry, the connection's reader and writer tasks, and any in-flight callback.

use crate::core::NetError;
use crate::core::state::{AtomicConnectionState, ConnectionId, ConnectionInfo, ConnectionState};
use bytes::Bytes;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot};

/// A unit of work for a connection's writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Write the whole payload, optionally reporting completion.
    Data {
        payload: Bytes,
        ack: Option<oneshot::Sender<Result<usize, NetError>>>,
    },
    /// Flush everything queued before this marker, then shut the write side down.
    Close,
}

/// The receiving ends created alongside a handle. They are consumed by the
/// connection's tasks when it starts running.
#[derive(Debug)]
pub(crate) struct ConnectionIo {
    pub(crate) outbox_rx: mpsc::UnboundedReceiver<Outbound>,
    pub(crate) kill_rx: broadcast::Receiver<()>,
}

#[derive(Debug)]
struct LastRead {
    buffer: Bytes,
    at: Instant,
}

/// One admitted connection.
///
/// The handle is reference counted: removing it from the registry makes it
/// unreachable by ID immediately, while tasks and callbacks that already hold
/// it keep it alive until they finish.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    addr: SocketAddr,
    created: Instant,
    state: AtomicConnectionState,
    last_read: Mutex<LastRead>,
    bytes_read_total: AtomicU64,
    bytes_written_total: AtomicU64,
    outbox: mpsc::UnboundedSender<Outbound>,
    kill_tx: broadcast::Sender<()>,
    /// Set by `close`. Writes are refused from then on, even while the reader is
    /// still winding down.
    closing: AtomicBool,
}

impl ConnectionHandle {
    pub(crate) fn new(id: ConnectionId, addr: SocketAddr) -> (Self, ConnectionIo) {
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = broadcast::channel(1);
        let now = Instant::now();
        let handle = Self {
            id,
            addr,
            created: now,
            state: AtomicConnectionState::new(ConnectionState::Admitted),
            last_read: Mutex::new(LastRead {
                buffer: Bytes::new(),
                at: now,
            }),
            bytes_read_total: AtomicU64::new(0),
            bytes_written_total: AtomicU64::new(0),
            outbox,
            kill_tx,
            closing: AtomicBool::new(false),
        };
        (handle, ConnectionIo { outbox_rx, kill_rx })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A human-readable `address:port` string for diagnostics.
    pub fn info_string(&self) -> String {
        self.addr.to_string()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    pub fn is_open(&self) -> bool {
        !self.closing.load(Ordering::Acquire) && !self.state().is_terminal()
    }

    /// Moves the lifecycle forward. Returns `false` if the move is not allowed,
    /// which includes any attempt to leave a terminal state.
    pub fn transition(&self, next: ConnectionState) -> bool {
        self.state.transition(next)
    }

    /// The bytes delivered by the most recent completed read.
    pub fn read_buffer(&self) -> Bytes {
        self.last_read.lock().buffer.clone()
    }

    /// The length of the most recent completed read.
    pub fn bytes_read(&self) -> usize {
        self.last_read.lock().buffer.len()
    }

    pub(crate) fn record_read(&self, buffer: Bytes) {
        self.bytes_read_total
            .fetch_add(buffer.len() as u64, Ordering::Relaxed);
        let mut last = self.last_read.lock();
        last.buffer = buffer;
        last.at = Instant::now();
    }

    pub(crate) fn record_write(&self, written: usize) {
        self.bytes_written_total
            .fetch_add(written as u64, Ordering::Relaxed);
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            addr: self.addr,
            created: self.created,
            last_activity: self.last_read.lock().at,
            bytes_read_total: self.bytes_read_total.load(Ordering::Relaxed),
            bytes_written_total: self.bytes_written_total.load(Ordering::Relaxed),
            state: self.state(),
        }
    }

    /// Queues `payload` for delivery and returns immediately.
    ///
    /// Payloads are written whole and in queue order by the connection's single
    /// writer task, so concurrent senders never interleave partial writes.
    pub fn schedule_write(&self, payload: impl Into<Bytes>) -> Result<(), NetError> {
        self.enqueue(payload.into(), None)
    }

    /// Queues `payload` and waits until every byte has been written to the socket.
    pub async fn write(&self, payload: impl Into<Bytes>) -> Result<usize, NetError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.enqueue(payload.into(), Some(ack_tx))?;
        ack_rx.await.map_err(|_| NetError::Closed(self.id))?
    }

    fn enqueue(
        &self,
        payload: Bytes,
        ack: Option<oneshot::Sender<Result<usize, NetError>>>,
    ) -> Result<(), NetError> {
        if !self.is_open() {
            return Err(NetError::Closed(self.id));
        }
        self.outbox
            .send(Outbound::Data { payload, ack })
            .map_err(|_| NetError::Closed(self.id))
    }

    /// Asks the connection's reader to stop. Any in-flight read completes with
    /// the close, and the disconnect path runs on the connection's own task.
    /// Writes issued after this call fail with `NetError::Closed`; payloads
    /// queued before it are still flushed.
    pub fn close(&self) {
        self.closing.store(true, Ordering::Release);
        let _ = self.kill_tx.send(());
    }

    /// Tells the writer to flush what is queued and then shut the write side down.
    pub(crate) fn close_outbox(&self) {
        let _ = self.outbox.send(Outbound::Close);
    }
}
