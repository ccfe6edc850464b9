// src/connection/writer.rs

//! The per-connection writer task. It owns the write half of the channel and
//! drains the connection's FIFO queue one payload at a time.

use super::handle::{ConnectionHandle, Outbound};
use crate::core::NetError;
use crate::core::metrics;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Writes queued payloads until a `Close` marker arrives or a write fails.
///
/// Each payload goes out with `write_all`, so a payload is either delivered in
/// full or the connection fails. The first failure is reported on `error_tx` and
/// the task exits; anything still queued is dropped and its waiters observe
/// `NetError::Closed`.
pub(crate) async fn run<W>(
    handle: Arc<ConnectionHandle>,
    mut sink: W,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    error_tx: mpsc::Sender<NetError>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = queue.recv().await {
        let (payload, ack) = match item {
            Outbound::Data { payload, ack } => (payload, ack),
            Outbound::Close => break,
        };

        let result = match sink.write_all(&payload).await {
            Ok(()) => sink.flush().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                handle.record_write(payload.len());
                metrics::BYTES_WRITTEN_TOTAL.inc_by(payload.len() as f64);
                if let Some(ack) = ack {
                    let _ = ack.send(Ok(payload.len()));
                }
            }
            Err(e) => {
                let err = NetError::from(e);
                if err.is_peer_close() {
                    debug!("Write to connection {} hit a closed peer: {}", handle.id(), err);
                } else {
                    warn!("Write to connection {} failed: {}", handle.id(), err);
                }
                if let Some(ack) = ack {
                    let _ = ack.send(Err(err.clone()));
                }
                let _ = error_tx.try_send(err);
                return;
            }
        }
    }

    if let Err(e) = sink.shutdown().await {
        debug!(
            "Shutting down write side of connection {} failed: {}",
            handle.id(),
            e
        );
    }
}
