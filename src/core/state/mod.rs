// src/core/state/mod.rs

//! Shared state: connection identity and metadata, the lifecycle state machine,
//! statistics, and the `Hub` that ties them together.

mod client;
mod hub;
mod lifecycle;
mod stats;

pub use client::*;
pub use hub::Hub;
pub use lifecycle::{AtomicConnectionState, ConnectionState};
pub use stats::StatsState;
