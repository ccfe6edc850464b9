// src/core/metrics.rs

//! Defines and registers Prometheus metrics for connection monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    // --- Gauges ---
    /// The number of connections currently held in a registry.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("tcplink_connected_clients", "Number of currently connected clients.").unwrap();

    // --- Connection Counters ---
    /// The total number of connections accepted from a listener since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("tcplink_connections_received_total", "Total number of connections received.").unwrap();
    /// Connections turned away because the registry was at capacity.
    pub static ref CONNECTIONS_REJECTED_TOTAL: Counter =
        register_counter!("tcplink_connections_rejected_total", "Total number of connections rejected at capacity.").unwrap();
    /// Connections refused by the application's connect hook.
    pub static ref CONNECTIONS_REFUSED_TOTAL: Counter =
        register_counter!("tcplink_connections_refused_total", "Total number of connections refused by the application.").unwrap();
    /// Read or write failures that evicted a connection.
    pub static ref TRANSPORT_ERRORS_TOTAL: Counter =
        register_counter!("tcplink_transport_errors_total", "Total number of connection-fatal transport errors.").unwrap();

    // --- Traffic Counters ---
    pub static ref BYTES_READ_TOTAL: Counter =
        register_counter!("tcplink_bytes_read_total", "Total number of bytes read from peers.").unwrap();
    pub static ref BYTES_WRITTEN_TOTAL: Counter =
        register_counter!("tcplink_bytes_written_total", "Total number of bytes written to peers.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
