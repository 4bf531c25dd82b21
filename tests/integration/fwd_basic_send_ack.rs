//! S1 — basic send/ack: a client handshakes over TLS with the right
//! shared secret, sends a two-entry chunked Message, and expects a
//! matching Ack plus both entries observed by the Receiver in order with
//! nanosecond-preserved timestamps.

use std::time::Duration;

use fwd_protocol::{EventEntry, EventTime, Message, TransportOption};
use fwd_server::receivers::MessageCollector;
use fwd_server::{FaultConfig, ServerConfig};
use fwd_test_utils::TestClient;

#[tokio::test]
async fn basic_send_receives_ack_and_ordered_entries() {
    let (collector, mut rx) = MessageCollector::new(Duration::from_secs(5));
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_owned(),
        shared_secret: Some("hi".to_owned()),
        tls: true,
        fault: FaultConfig::default(),
    };
    let handle = fwd_server::launch_server(config, Box::new(collector))
        .await
        .expect("server should bind");

    let mut client = TestClient::connect(&handle.local_addr().to_string(), Some("hi"), true)
        .await
        .expect("handshake with the right secret should succeed");

    let entries = vec![
        EventEntry::new(
            EventTime::new(1_604_106_123, 4),
            rmpv::Value::Map(vec![
                (rmpv::Value::from("field1"), rmpv::Value::from("foo")),
                (rmpv::Value::from("field2"), rmpv::Value::from("bar")),
            ]),
        ),
        EventEntry::new(
            EventTime::new(1_606_698_123, 4),
            rmpv::Value::Map(vec![
                (rmpv::Value::from("field1"), rmpv::Value::from("FOO")),
                (rmpv::Value::from("field2"), rmpv::Value::from("BAR")),
            ]),
        ),
    ];
    let message = Message::new("hello", entries, TransportOption::with_chunk("first"));
    client.send_message(&message).await.unwrap();

    let ack = client.recv_ack().await.unwrap();
    assert_eq!(ack.chunk, "first");

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("receiver should observe the message")
        .expect("channel should still be open");
    assert_eq!(received.tag, "hello");
    assert_eq!(received.entries.len(), 2);
    assert_eq!(received.entries[0].time.nanoseconds, 4);
    assert_eq!(received.entries[1].time.nanoseconds, 4);
    assert_eq!(
        received.entries[0]
            .record
            .as_map()
            .unwrap()
            .iter()
            .find(|(k, _)| k.as_str() == Some("field1"))
            .unwrap()
            .1
            .as_str(),
        Some("foo")
    );

    handle.shutdown().await;
}
