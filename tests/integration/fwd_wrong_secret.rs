//! S2 — wrong secret: a client presenting the wrong shared key detects a
//! digest mismatch itself; the server closes the connection cleanly
//! without ever inspecting the client's digest.

use std::time::Duration;

use fwd_server::receivers::MessageCollector;
use fwd_server::{FaultConfig, ServerConfig};
use fwd_test_utils::{HandshakeResult, TestClient};

#[tokio::test]
async fn wrong_shared_secret_fails_on_the_client_side() {
    let (collector, _rx) = MessageCollector::new(Duration::from_secs(5));
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_owned(),
        shared_secret: Some("right".to_owned()),
        tls: false,
        fault: FaultConfig::default(),
    };
    let handle = fwd_server::launch_server(config, Box::new(collector))
        .await
        .expect("server should bind");

    let (_client, outcome) =
        TestClient::connect_and_handshake(&handle.local_addr().to_string(), Some("wrong"), false)
            .await
            .expect("handshake I/O should succeed even though auth will fail");

    assert_eq!(outcome, Some(HandshakeResult::BadDigest));

    handle.shutdown().await;
}
