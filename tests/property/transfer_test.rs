// tests/property/transfer_test.rs

//! Property-based tests for byte-stream delivery through a connection

use crate::test_helpers::{DuplexHarness, EVENT_TIMEOUT, Event, RecordingDispatcher};
use bytes::Bytes;
use proptest::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 30, // Each case spins up a runtime
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_inbound_chunks_delivered_in_order(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..512), 1..20)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (dispatcher, mut events) = RecordingDispatcher::new();
            let mut harness = DuplexHarness::new(1, dispatcher);
            let (mut peer, _task) = harness.connect().unwrap();
            let id = events.expect_connected().await;

            let expected: Vec<u8> = chunks.concat();
            let writer = tokio::spawn(async move {
                for chunk in &chunks {
                    peer.write_all(chunk).await.unwrap();
                }
                peer
            });

            let mut received = Vec::new();
            while received.len() < expected.len() {
                match events.next().await {
                    Event::Data(from, data) => {
                        assert_eq!(from, id);
                        assert!(!data.is_empty());
                        received.extend(data);
                    }
                    other => panic!("unexpected event {other:?}"),
                }
            }
            assert_eq!(received, expected);
            drop(writer.await.unwrap());
        });
    }

    #[test]
    fn test_outbound_payloads_never_interleave(
        lengths in prop::collection::vec(1usize..256, 1..30)
    ) {
        // Payload `i` is `lengths[i]` copies of the byte `i`, so any interleaving
        // splits a run.
        let payloads: Vec<Vec<u8>> = lengths
            .iter()
            .enumerate()
            .map(|(i, len)| vec![i as u8; *len])
            .collect();
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (dispatcher, mut events) = RecordingDispatcher::new();
            let mut harness = DuplexHarness::new(1, dispatcher);
            let (mut peer, _task) = harness.connect().unwrap();
            let id = events.expect_connected().await;

            let total: usize = payloads.iter().map(Vec::len).sum();
            let reader = tokio::spawn(async move {
                let mut buf = vec![0u8; total];
                tokio::time::timeout(EVENT_TIMEOUT, peer.read_exact(&mut buf))
                    .await
                    .unwrap()
                    .unwrap();
                buf
            });

            // Mix fire-and-forget and awaited writes from concurrent tasks; each
            // payload still lands contiguously.
            let mut tasks = Vec::new();
            for (i, payload) in payloads.iter().cloned().enumerate() {
                let hub = harness.hub.clone();
                tasks.push(tokio::spawn(async move {
                    if i % 2 == 0 {
                        hub.send_to(id, Bytes::from(payload)).unwrap();
                    } else {
                        hub.write_to(id, payload).await.unwrap();
                    }
                }));
            }
            for task in tasks {
                task.await.unwrap();
            }

            let received = reader.await.unwrap();
            for (i, payload) in payloads.iter().enumerate() {
                let first = received.iter().position(|b| *b == i as u8).unwrap();
                assert_eq!(&received[first..first + payload.len()], &payload[..]);
            }
        });
    }
}
