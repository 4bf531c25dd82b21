//! S6 — random_kill_conn fault: the server still observes a message the
//! client sent, but the connection is torn down before any Ack is written,
//! so the client never receives one.

use std::time::Duration;

use fwd_protocol::{EventEntry, EventTime, Message, TransportOption};
use fwd_server::receivers::MessageCollector;
use fwd_server::{FaultConfig, ServerConfig};
use fwd_test_utils::TestClient;

#[tokio::test]
async fn random_kill_conn_drops_connection_after_delivering_the_message() {
    let (collector, mut rx) = MessageCollector::new(Duration::from_secs(5));
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_owned(),
        shared_secret: None,
        tls: false,
        fault: FaultConfig {
            random_kill_conn: 1.0,
            ..FaultConfig::default()
        },
    };
    let handle = fwd_server::launch_server(config, Box::new(collector))
        .await
        .expect("server should bind");

    let mut client = TestClient::connect(&handle.local_addr().to_string(), None, false)
        .await
        .unwrap();

    let entries = vec![EventEntry::new(EventTime::new(42, 0), rmpv::Value::from("hi"))];
    let message = Message::new("killed.tag", entries, TransportOption::with_chunk("x"));
    client.send_message(&message).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("receiver should still observe the message before the connection dies")
        .expect("channel should still be open");
    assert_eq!(received.tag, "killed.tag");

    let ack_result = tokio::time::timeout(Duration::from_secs(5), client.recv_ack()).await;
    match ack_result {
        Ok(Ok(ack)) => panic!("expected no ack, got {ack:?}"),
        Ok(Err(_)) => {}
        Err(_) => panic!("connection should have been closed, not merely idle"),
    }

    handle.shutdown().await;
}
