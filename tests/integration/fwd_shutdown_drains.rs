//! Invariant 8 — shutdown drains: `ServerHandle::shutdown` does not return
//! until the Receiver has seen every accepted message and had `end` called
//! exactly once, after all `accept` calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fwd_protocol::{EventEntry, EventTime, Message, TransportOption};
use fwd_server::{ClientMessage, FaultConfig, Receiver, ReceiverError, ServerConfig};
use fwd_test_utils::TestClient;

#[derive(Clone, Default)]
struct RecordingReceiver {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl Receiver for RecordingReceiver {
    async fn accept(&mut self, msg: ClientMessage) -> Result<(), ReceiverError> {
        self.log.lock().unwrap().push(format!("accept:{}", msg.message.tag));
        Ok(())
    }

    async fn end(&mut self) -> Result<(), ReceiverError> {
        self.log.lock().unwrap().push("end".to_owned());
        Ok(())
    }
}

#[tokio::test]
async fn shutdown_waits_for_pending_messages_then_calls_end_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let receiver = RecordingReceiver { log: log.clone() };

    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_owned(),
        shared_secret: None,
        tls: false,
        fault: FaultConfig::default(),
    };
    let handle = fwd_server::launch_server(config, Box::new(receiver))
        .await
        .expect("server should bind");

    let mut client = TestClient::connect(&handle.local_addr().to_string(), None, false)
        .await
        .unwrap();

    let entries = vec![EventEntry::new(EventTime::new(7, 0), rmpv::Value::from("x"))];
    let message = Message::new("drain.tag", entries, TransportOption::default());
    client.send_message(&message).await.unwrap();

    handle.shutdown().await;

    let final_log = log.lock().unwrap().clone();
    assert!(
        final_log.contains(&"accept:drain.tag".to_owned()),
        "expected the pending message to be drained before shutdown completed: {final_log:?}"
    );
    assert_eq!(
        final_log.last(),
        Some(&"end".to_owned()),
        "end must run last, after every accept: {final_log:?}"
    );
    assert_eq!(
        final_log.iter().filter(|entry| *entry == "end").count(),
        1,
        "end must run exactly once: {final_log:?}"
    );

    // Give the connection a moment to be torn down before the test process exits.
    tokio::time::sleep(Duration::from_millis(10)).await;
}
