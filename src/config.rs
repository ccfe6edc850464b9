// src/config.rs

//! Manages configuration: loading from TOML, defaults, and validation.

use crate::core::NetError;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Per-connection I/O settings shared by servers and clients.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectionConfig {
    /// Capacity of the buffer each read fills. One read delivers at most this many bytes.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Sets `TCP_NODELAY` on accepted and connected sockets.
    #[serde(default = "default_no_delay")]
    pub no_delay: bool,
    /// How long `stop()` waits for connection tasks before aborting them.
    #[serde(with = "humantime_serde", default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,
    /// How long a closing connection waits for its queued writes to flush.
    #[serde(with = "humantime_serde", default = "default_writer_drain_timeout")]
    pub writer_drain_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: default_read_buffer_size(),
            no_delay: default_no_delay(),
            shutdown_timeout: default_shutdown_timeout(),
            writer_drain_timeout: default_writer_drain_timeout(),
        }
    }
}

fn default_read_buffer_size() -> usize {
    1024
}
fn default_no_delay() -> bool {
    true
}
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_writer_drain_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Settings for the outbound connector.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectorConfig {
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Configuration for the Prometheus metrics endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9090
}

/// The complete, validated configuration file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub client: ConnectorConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            connection: ConnectionConfig::default(),
            client: ConnectorConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Like `from_file`, but falls back to defaults when `path` does not exist.
    pub fn from_file_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            warn!("Config file '{}' not found; using defaults.", path);
            Ok(Self::default())
        }
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.connection.read_buffer_size == 0 {
            return Err(anyhow!("connection.read_buffer_size cannot be 0"));
        }
        if self.metrics.enabled && self.metrics.port == self.port {
            return Err(anyhow!(
                "metrics.port ({}) cannot be the same as the server port",
                self.metrics.port
            ));
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            max_clients: self.max_clients,
            connection: self.connection.clone(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn client_config(&self, host: &str, port: u16) -> ClientConfig {
        ClientConfig {
            host: host.to_string(),
            port,
            connect_timeout: self.client.connect_timeout,
            connection: self.connection.clone(),
        }
    }
}

/// Everything a `Server` needs to run.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` binds an ephemeral port; `Server::local_addr` reports the real one.
    pub port: u16,
    pub max_clients: usize,
    pub connection: ConnectionConfig,
    pub metrics: MetricsConfig,
}

impl ServerConfig {
    /// A server listening on all interfaces with the given port and capacity.
    pub fn new(port: u16, max_clients: usize) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port,
            max_clients,
            connection: ConnectionConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), NetError> {
        if self.max_clients == 0 {
            return Err(NetError::InvalidConfig("max_clients cannot be 0".into()));
        }
        if self.connection.read_buffer_size == 0 {
            return Err(NetError::InvalidConfig(
                "read_buffer_size cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Everything a `Client` needs to connect.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub connection: ConnectionConfig,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: default_connect_timeout(),
            connection: ConnectionConfig::default(),
        }
    }
}
