//! S3 — compressed batch: a client sends three entries as
//! CompressedPackedForward (gzip-compressed, concatenated msgpack
//! `EventEntry` values as a single Binary). The server must deliver three
//! EventEntry values identical to the inputs.

use std::io::Write as _;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use fwd_protocol::{EventEntry, EventTime};
use fwd_server::receivers::MessageCollector;
use fwd_server::{FaultConfig, ServerConfig};
use fwd_test_utils::TestClient;

fn gzip_packed_entries(entries: &[EventEntry]) -> Vec<u8> {
    let mut packed = Vec::new();
    for entry in entries {
        rmpv::encode::write_value(&mut packed, &entry.to_value()).unwrap();
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&packed).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn compressed_packed_forward_delivers_identical_entries() {
    let (collector, mut rx) = MessageCollector::new(Duration::from_secs(5));
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_owned(),
        shared_secret: None,
        tls: false,
        fault: FaultConfig::default(),
    };
    let handle = fwd_server::launch_server(config, Box::new(collector))
        .await
        .expect("server should bind");

    let mut client = TestClient::connect(&handle.local_addr().to_string(), None, false)
        .await
        .unwrap();

    let entries = vec![
        EventEntry::new(EventTime::new(1, 0), rmpv::Value::from("a")),
        EventEntry::new(EventTime::new(2, 0), rmpv::Value::from("b")),
        EventEntry::new(EventTime::new(3, 0), rmpv::Value::from("c")),
    ];
    let compressed = gzip_packed_entries(&entries);

    let wire_value = rmpv::Value::Array(vec![
        rmpv::Value::from("compressed.tag"),
        rmpv::Value::Binary(compressed),
        rmpv::Value::Map(vec![(
            rmpv::Value::from("compressed"),
            rmpv::Value::from("gzip"),
        )]),
    ]);
    client.send_value(&wire_value).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.tag, "compressed.tag");
    assert_eq!(received.entries, entries);

    handle.shutdown().await;
}
