// src/main.rs

//! A demo chat server (and matching line client) built on tcplink.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::env;
use std::sync::Arc;
use tcplink::config::Config;
use tcplink::{Client, ConnectionId, ConnectionInfo, EventDispatcher, Hub, NetError, server};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

/// Greets new clients, announces arrivals and departures to everyone else, and
/// rebroadcasts `test` lines.
struct ChatDispatcher;

#[async_trait]
impl EventDispatcher for ChatDispatcher {
    async fn on_client_connected(&self, hub: &Hub, id: ConnectionId) -> bool {
        let info = hub.info_string(id).unwrap_or_default();
        if let Err(e) = hub.send_str(id, &format!("Your ID is : {id}\r\n")) {
            warn!("Could not greet connection {}: {}", id, e);
        }
        hub.broadcast_str(&format!("New client connected : {info}\r\n"), Some(id));
        true
    }

    async fn on_data_received(&self, hub: &Hub, id: ConnectionId, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        info!("From [{}] : {}", id, text.trim_end());
        if text == "test\r\n" || text == "test\n" {
            let origin = hub.info_string(id).unwrap_or_default();
            hub.broadcast_str(&format!("test message from : {origin}\r\n"), Some(id));
        }
    }

    async fn on_disconnected(&self, hub: &Hub, info: &ConnectionInfo) {
        hub.broadcast_str(
            &format!("[{}] {} Disconnected...\r\n", info.id, info.addr),
            Some(info.id),
        );
    }

    async fn on_connection_error(&self, _hub: &Hub, error: &NetError) {
        error!("{}", error);
    }
}

/// Prints whatever the server sends.
struct PrintingDispatcher;

#[async_trait]
impl EventDispatcher for PrintingDispatcher {
    async fn on_data_received(&self, _hub: &Hub, _id: ConnectionId, data: &[u8]) {
        print!("{}", String::from_utf8_lossy(data));
    }

    async fn on_disconnected(&self, _hub: &Hub, _info: &ConnectionInfo) {
        println!("Disconnected from server.");
    }

    async fn on_connection_error(&self, _hub: &Hub, error: &NetError) {
        eprintln!("Connection error: {error}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("tcplink version {VERSION}");
        return Ok(());
    }

    let config_path = flag_value(&args, "--config").unwrap_or("config.toml");
    let mut config = match Config::from_file_or_default(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    if let Some(port_str) = flag_value(&args, "--port") {
        config.port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid port number: {port_str}"))?;
    }

    init_logging(&config);

    if let Some(target) = flag_value(&args, "--connect") {
        return run_client(&config, target).await;
    }

    info!("Starting tcplink chat server v{}", VERSION);
    if let Err(e) = server::run(config, Arc::new(ChatDispatcher)).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Sets up logging with a filter taken from `RUST_LOG` or the config.
fn init_logging(config: &Config) {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());

    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true), // Enable ANSI color codes for log levels.
        )
        .init();
}

/// Connects to `target` (`host:port`) and pipes stdin lines to the server.
async fn run_client(config: &Config, target: &str) -> Result<()> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("--connect expects host:port, got '{target}'"))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| anyhow!("Invalid port number: {port}"))?;

    let client = Client::connect(config.client_config(host, port), Arc::new(PrintingDispatcher))
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => client.send(format!("{line}\r\n"))?,
                    None => {
                        client.disconnect();
                        break;
                    }
                }
            }
            _ = client.wait() => return Ok(()),
        }
    }
    client.wait().await;
    Ok(())
}
