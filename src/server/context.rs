// src/server/context.rs

use crate::core::state::Hub;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the accept loop.
pub struct ServerContext<A> {
    pub hub: Hub,
    pub acceptor: A,
    /// Flipped to `true` once the accept loop has fully wound down.
    pub finished_tx: watch::Sender<bool>,
    pub background_tasks: JoinSet<()>,
}
