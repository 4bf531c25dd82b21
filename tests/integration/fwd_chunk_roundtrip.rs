//! S4/S5 — chunk file round-trip: a `.flb` chunk written to disk dumps as
//! JSON with its entries intact (S4), and a chunk with a corrupted trailing
//! record is rejected with a positional error rather than silently
//! truncated or panicking (S5).

use std::fs;

use fwd_protocol::chunk::make_header;
use fwd_protocol::{EventEntry, EventTime};
use tempfile::tempdir;

fn write_entries(buf: &mut Vec<u8>, entries: &[EventEntry]) {
    for entry in entries {
        rmpv::encode::write_value(buf, &entry.to_value()).unwrap();
    }
}

#[test]
fn chunk_file_round_trips_to_json() {
    let dir = tempdir().unwrap();
    let entries = vec![
        EventEntry::new(
            EventTime::new(1_700_000_000, 1),
            rmpv::Value::Map(vec![(rmpv::Value::from("msg"), rmpv::Value::from("one"))]),
        ),
        EventEntry::new(
            EventTime::new(1_700_000_001, 2),
            rmpv::Value::Map(vec![(rmpv::Value::from("msg"), rmpv::Value::from("two"))]),
        ),
    ];

    let mut buf = make_header("app.access");
    write_entries(&mut buf, &entries);
    let path = dir.path().join("batch.flb");
    fs::write(&path, &buf).unwrap();

    let mut out = Vec::new();
    fwd_dump::dump_file(&path, true, &mut out).unwrap();
    let rendered = String::from_utf8(out).unwrap();

    assert!(rendered.contains("app.access"));
    assert!(rendered.contains("\"one\""));
    assert!(rendered.contains("\"two\""));
}

#[test]
fn corrupted_trailing_record_is_rejected_not_silently_dropped() {
    let dir = tempdir().unwrap();
    let entries = vec![EventEntry::new(EventTime::new(1, 0), rmpv::Value::from("ok"))];

    let mut buf = make_header("app.access");
    write_entries(&mut buf, &entries);
    // Trailing garbage too short to be a real record.
    buf.extend_from_slice(&[0x00, 0x00, 0x00]);
    let path = dir.path().join("corrupt.flb");
    fs::write(&path, &buf).unwrap();

    let mut out = Vec::new();
    let result = fwd_dump::dump_file(&path, true, &mut out);
    assert!(matches!(result, Err(fwd_dump::DumpError::Record { .. })));
}
