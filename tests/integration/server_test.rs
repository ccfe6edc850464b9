// tests/integration/server_test.rs

//! End-to-end tests for the server over loopback TCP.

use super::fixtures::PING;
use super::test_helpers::{
    Event, RecordingDispatcher, ScriptedAcceptor, init_tracing, read_to_close, read_until,
    start_server,
};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tcplink::config::ServerConfig;
use tcplink::server::REJECTION_MESSAGE;
use tcplink::{ConnectionId, ConnectionInfo, EventDispatcher, Hub, NetError, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_start_reports_bound_address() {
    let (dispatcher, _events) = RecordingDispatcher::new();
    let (server, addr) = start_server(4, dispatcher).await;

    assert_ne!(addr.port(), 0);
    assert_eq!(server.local_addr(), Some(addr));
    assert!(matches!(server.start().await, Err(NetError::AlreadyStarted)));
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_wait_and_stop_require_start() {
    init_tracing();
    let (dispatcher, _events) = RecordingDispatcher::new();
    let server = Server::new(ServerConfig::new(0, 4).with_host("127.0.0.1"), dispatcher);
    assert!(matches!(server.wait().await, Err(NetError::NotStarted)));
    assert!(matches!(server.stop().await, Err(NetError::NotStarted)));
}

#[tokio::test]
async fn test_zero_capacity_is_rejected_at_start() {
    init_tracing();
    let (dispatcher, _events) = RecordingDispatcher::new();
    let server = Server::new(ServerConfig::new(0, 0).with_host("127.0.0.1"), dispatcher);
    assert!(matches!(server.start().await, Err(NetError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_client_over_capacity_receives_rejection_notice() {
    let (dispatcher, mut events) = RecordingDispatcher::new();
    let (server, addr) = start_server(1, dispatcher).await;

    let _first = TcpStream::connect(addr).await.unwrap();
    events.expect_connected().await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    let notice = read_to_close(&mut second).await;
    assert_eq!(notice, REJECTION_MESSAGE);

    // The rejected peer never reached the application.
    assert!(events.is_quiet_for(Duration::from_millis(100)).await);
    assert_eq!(server.hub().stats().get_rejected(), 1);
    assert_eq!(server.hub().connection_count(), 1);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_slot_frees_after_disconnect() {
    let (dispatcher, mut events) = RecordingDispatcher::new();
    let (server, addr) = start_server(1, dispatcher).await;

    let first = TcpStream::connect(addr).await.unwrap();
    let id = events.expect_connected().await;
    drop(first);
    events
        .wait_for(|e| *e == Event::Disconnected(id))
        .await;

    let _second = TcpStream::connect(addr).await.unwrap();
    let next = events.expect_connected().await;
    assert_eq!(next.get(), id.get() + 1);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_refused_connection_is_closed() {
    let (dispatcher, mut events) = RecordingDispatcher::new();
    dispatcher.refuse(1);
    let (server, addr) = start_server(4, dispatcher).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    events.expect_connected().await;
    let rest = read_to_close(&mut stream).await;
    assert!(rest.is_empty());
    assert!(events.is_quiet_for(Duration::from_millis(100)).await);
    assert_eq!(server.hub().stats().get_refused(), 1);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_disconnects_clients_and_completes_wait() {
    let (dispatcher, mut events) = RecordingDispatcher::new();
    let (server, addr) = start_server(4, dispatcher).await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    let mut b = TcpStream::connect(addr).await.unwrap();
    let first = events.expect_connected().await;
    events.expect_connected().await;
    let held = server.hub().registry().lookup(first).unwrap();

    server.stop().await.unwrap();
    server.wait().await.unwrap();

    assert_eq!(server.hub().connection_count(), 0);
    assert!(matches!(held.schedule_write(PING), Err(NetError::Closed(_))));

    let disconnected = events
        .drain_now()
        .into_iter()
        .filter(|e| matches!(e, Event::Disconnected(_)))
        .count();
    assert_eq!(disconnected, 2);
    assert!(read_to_close(&mut a).await.is_empty());
    assert!(read_to_close(&mut b).await.is_empty());
    assert!(TcpStream::connect(addr).await.is_err());
}

/// Mirrors the chat scenario: greet each client, announce new ones to the
/// others, and announce departures.
struct AnnouncingDispatcher {
    data: mpsc::UnboundedSender<(ConnectionId, Vec<u8>, usize)>,
}

#[async_trait]
impl EventDispatcher for AnnouncingDispatcher {
    async fn on_client_connected(&self, hub: &Hub, id: ConnectionId) -> bool {
        hub.send_str(id, &format!("Your ID is : {id}\r\n")).unwrap();
        let info = hub.info_string(id).unwrap();
        hub.broadcast_str(&format!("New client connected : {info}\r\n"), Some(id));
        true
    }

    async fn on_data_received(&self, hub: &Hub, id: ConnectionId, data: &[u8]) {
        let len = hub.bytes_read(id).unwrap();
        let _ = self.data.send((id, data.to_vec(), len));
    }

    async fn on_disconnected(&self, hub: &Hub, info: &ConnectionInfo) {
        hub.broadcast_str(&format!("[{}] Disconnected...\r\n", info.id), Some(info.id));
    }
}

#[tokio::test]
async fn test_capacity_broadcast_and_disconnect_scenario() {
    let (data_tx, mut data_rx) = mpsc::unbounded_channel();
    let dispatcher = Arc::new(AnnouncingDispatcher { data: data_tx });
    let (server, addr) = start_server(2, dispatcher).await;

    let mut c1 = TcpStream::connect(addr).await.unwrap();
    read_until(&mut c1, "Your ID is : 1\r\n").await;

    let mut c2 = TcpStream::connect(addr).await.unwrap();
    read_until(&mut c2, "Your ID is : 2\r\n").await;
    let c2_addr = c2.local_addr().unwrap();
    let announce = read_until(&mut c1, "\r\n").await;
    assert_eq!(announce, format!("New client connected : {c2_addr}\r\n"));

    let mut c3 = TcpStream::connect(addr).await.unwrap();
    assert_eq!(read_to_close(&mut c3).await, REJECTION_MESSAGE);

    c1.write_all(PING).await.unwrap();
    let (from, data, len) = tokio::time::timeout(Duration::from_secs(5), data_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(from.get(), 1);
    assert_eq!(data, PING);
    assert_eq!(len, 4);

    assert!(server.hub().disconnect(from));
    read_to_close(&mut c1).await;
    read_until(&mut c2, "[1] Disconnected...\r\n").await;

    assert_eq!(server.hub().connection_ids(), vec![ConnectionId::new(2).unwrap()]);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_broadcast_reaches_everyone_but_the_excluded() {
    let (dispatcher, mut events) = RecordingDispatcher::new();
    let (server, addr) = start_server(8, dispatcher).await;

    let mut streams = Vec::new();
    let mut ids = Vec::new();
    for _ in 0..3 {
        streams.push(TcpStream::connect(addr).await.unwrap());
        ids.push(events.expect_connected().await);
    }

    let delivered = server.hub().broadcast_str("hi all\n", Some(ids[0]));
    assert_eq!(delivered, 2);
    read_until(&mut streams[1], "hi all\n").await;
    read_until(&mut streams[2], "hi all\n").await;

    let delivered = server.hub().broadcast_str("everyone\n", None);
    assert_eq!(delivered, 3);
    let first = read_until(&mut streams[0], "everyone\n").await;
    assert!(!first.contains("hi all"));
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_acceptor_failure_stops_admission_but_keeps_connections() {
    init_tracing();
    let (dispatcher, mut events) = RecordingDispatcher::new();
    let server = Server::new(ServerConfig::new(0, 4), dispatcher);
    let (acceptor, feed) = ScriptedAcceptor::new();
    let addr = server.start_with_acceptor(acceptor).unwrap();
    assert_eq!(addr, SocketAddr::from(([10, 0, 0, 254], 7000)));

    let (local, mut peer) = tokio::io::duplex(4096);
    feed.send(Ok((local, SocketAddr::from(([10, 0, 0, 1], 50001)))))
        .unwrap();
    let id = events.expect_connected().await;

    feed.send(Err(io::Error::other("listener torn down"))).unwrap();
    match events.next().await {
        Event::ConnectionError(msg) => {
            assert!(msg.contains("Acceptor stopped"), "unexpected error {msg:?}");
            assert!(msg.contains("listener torn down"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    peer.write_all(PING).await.unwrap();
    assert_eq!(events.next().await, Event::Data(id, PING.to_vec()));

    // Nothing is accepted any more.
    let (late, _late_peer) = tokio::io::duplex(4096);
    feed.send(Ok((late, SocketAddr::from(([10, 0, 0, 1], 50002)))))
        .unwrap();
    assert!(events.is_quiet_for(Duration::from_millis(100)).await);
    assert_eq!(server.hub().connection_count(), 1);

    server.stop().await.unwrap();
    assert_eq!(events.next().await, Event::Disconnected(id));
    let mut rest = Vec::new();
    peer.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_second_start_with_acceptor_is_rejected() {
    init_tracing();
    let (dispatcher, _events) = RecordingDispatcher::new();
    let server = Server::new(ServerConfig::new(0, 4), dispatcher);
    let (first, _feed) = ScriptedAcceptor::new();
    let (second, _second_feed) = ScriptedAcceptor::new();

    server.start_with_acceptor(first).unwrap();
    assert!(matches!(
        server.start_with_acceptor(second),
        Err(NetError::AlreadyStarted)
    ));
    server.stop().await.unwrap();
}
