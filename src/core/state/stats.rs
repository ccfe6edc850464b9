// src/core/state/stats.rs

//! Contains server-wide connection statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds all state and logic related to connection statistics.
#[derive(Debug)]
pub struct StatsState {
    /// Connections accepted from the listener (or connector) since startup.
    total_connections: AtomicU64,
    /// Connections turned away because the registry was full.
    rejected_connections: AtomicU64,
    /// Connections admitted but then refused by the application hook.
    refused_connections: AtomicU64,
    /// Connections that completed the disconnect path.
    disconnected_connections: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            refused_connections: AtomicU64::new(0),
            disconnected_connections: AtomicU64::new(0),
        }
    }

    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn increment_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_rejected(&self) -> u64 {
        self.rejected_connections.load(Ordering::Relaxed)
    }

    pub fn increment_refused(&self) {
        self.refused_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_refused(&self) -> u64 {
        self.refused_connections.load(Ordering::Relaxed)
    }

    pub fn increment_disconnected(&self) {
        self.disconnected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_disconnected(&self) -> u64 {
        self.disconnected_connections.load(Ordering::Relaxed)
    }
}
