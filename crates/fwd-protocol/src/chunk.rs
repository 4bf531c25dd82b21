//! Fluent Bit on-disk chunk file codec (C3): fixed 24-byte header + tag +
//! a stream of msgpack-encoded `EventEntry` values.

use std::io;

use crate::message::EventEntry;

pub const IDENT_BYTE_0: u8 = 0xC1;
pub const IDENT_BYTE_1: u8 = 0x00;
pub const HEADER_LEN: usize = 24;
/// Every EventEntry in a chunk stream must consume at least this many
/// bytes; anything shorter is almost always trailing NULs from a crashed
/// writer.
pub const MIN_RECORD_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk buffer too short: {len} bytes, need at least {need}")]
    TooShort { len: usize, need: usize },
    #[error("bad chunk ident bytes")]
    BadIdent,
    #[error("invalid UTF-8 tag: {0}")]
    InvalidTag(#[from] std::str::Utf8Error),
    #[error("tag too long for 16-bit length field: {0} bytes")]
    TagTooLong(usize),
}

/// One entry of `IterateRecords` failure: a positional corruption error
/// carrying the byte range of the offending record.
#[derive(Debug, thiserror::Error)]
#[error("record {index} at {start}-{end}/{total}: {reason}")]
pub struct RecordError {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IterateError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Callback(E),
}

/// Builds a fresh chunk header for `tag` with a zeroed CRC slot and
/// padding. Panics if `tag` exceeds 65,535 bytes, since the length field is
/// 16 bits wide — this is a programming error at construction time, not a
/// runtime data error.
pub fn make_header(tag: &str) -> Vec<u8> {
    assert!(
        tag.len() <= u16::MAX as usize,
        "chunk tag exceeds 65535 bytes: {}",
        tag.len()
    );
    let mut buf = vec![0u8; HEADER_LEN];
    buf[0] = IDENT_BYTE_0;
    buf[1] = IDENT_BYTE_1;
    buf[22..24].copy_from_slice(&(tag.len() as u16).to_be_bytes());
    buf.extend_from_slice(tag.as_bytes());
    buf
}

/// Parses a chunk buffer into `(tag, payload)`, both borrowed from the
/// input with no copies.
pub fn parse_chunk(bytes: &[u8]) -> Result<(&str, &[u8]), ChunkError> {
    if bytes.len() < HEADER_LEN {
        return Err(ChunkError::TooShort {
            len: bytes.len(),
            need: HEADER_LEN,
        });
    }
    if bytes[0] != IDENT_BYTE_0 || bytes[1] != IDENT_BYTE_1 {
        return Err(ChunkError::BadIdent);
    }
    let tag_len = u16::from_be_bytes([bytes[22], bytes[23]]) as usize;
    let tag_start = HEADER_LEN;
    let tag_end = tag_start + tag_len;
    if bytes.len() < tag_end {
        return Err(ChunkError::TooShort {
            len: bytes.len(),
            need: tag_end,
        });
    }
    let tag = std::str::from_utf8(&bytes[tag_start..tag_end])?;
    Ok((tag, &bytes[tag_end..]))
}

/// Decodes `payload` as a sequence of `EventEntry` values, invoking `visit`
/// for each with its byte range within `payload`. Stops cleanly at EOF.
/// Any record consuming fewer than `MIN_RECORD_LEN` bytes, or any decode
/// failure other than EOF, aborts with a positional `RecordError`.
/// Callback errors abort iteration and are returned verbatim.
pub fn iterate_records<E: std::error::Error + 'static>(
    payload: &[u8],
    mut visit: impl FnMut(EventEntry, usize, usize) -> Result<(), E>,
) -> Result<(), IterateError<E>> {
    let total = payload.len();
    let mut cursor = io::Cursor::new(payload);
    let mut index = 0usize;
    loop {
        let start = cursor.position() as usize;
        if start == total {
            break;
        }
        match rmpv::decode::read_value(&mut cursor) {
            Ok(value) => {
                let end = cursor.position() as usize;
                if end - start < MIN_RECORD_LEN {
                    return Err(RecordError {
                        index,
                        start,
                        end,
                        total,
                        reason: format!(
                            "record shorter than {MIN_RECORD_LEN} bytes minimum"
                        ),
                    }
                    .into());
                }
                let entry = match EventEntry::from_value(value) {
                    Ok(entry) => entry,
                    Err(e) => {
                        return Err(RecordError {
                            index,
                            start,
                            end,
                            total,
                            reason: e.to_string(),
                        }
                        .into());
                    }
                };
                visit(entry, start, end).map_err(IterateError::Callback)?;
                index += 1;
            }
            Err(e) => {
                let is_eof = matches!(
                    &e,
                    rmpv::decode::Error::InvalidMarkerRead(io_err)
                        if io_err.kind() == io::ErrorKind::UnexpectedEof
                );
                if is_eof {
                    break;
                }
                return Err(RecordError {
                    index,
                    start,
                    end: cursor.position() as usize,
                    total,
                    reason: e.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventtime::EventTime;

    fn entry(sec: u32) -> EventEntry {
        EventEntry::new(
            EventTime::new(sec, 0),
            rmpv::Value::Map(vec![(rmpv::Value::from("k"), rmpv::Value::from("v"))]),
        )
    }

    #[test]
    fn header_round_trips_with_payload() {
        let mut buf = make_header("app.log");
        let e1 = entry(1);
        let e2 = entry(2);
        rmpv::encode::write_value(&mut buf, &e1.to_value()).unwrap();
        rmpv::encode::write_value(&mut buf, &e2.to_value()).unwrap();

        let (tag, payload) = parse_chunk(&buf).unwrap();
        assert_eq!(tag, "app.log");

        let mut seen = Vec::new();
        iterate_records::<std::convert::Infallible>(payload, |e, _s, _e2| {
            seen.push(e);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![e1, e2]);
    }

    #[test]
    fn too_short_buffer_is_rejected() {
        assert!(matches!(
            parse_chunk(&[0u8; 10]),
            Err(ChunkError::TooShort { .. })
        ));
    }

    #[test]
    fn bad_ident_is_rejected() {
        let mut buf = make_header("t");
        buf[0] = 0xFF;
        assert!(matches!(parse_chunk(&buf), Err(ChunkError::BadIdent)));
    }

    #[test]
    fn corrupt_trailing_bytes_report_positional_error() {
        let mut buf = make_header("t");
        let e1 = entry(1);
        rmpv::encode::write_value(&mut buf, &e1.to_value()).unwrap();
        let (_, payload) = parse_chunk(&buf).unwrap();
        let mut corrupted = payload.to_vec();
        corrupted.extend_from_slice(&[0x00, 0x00, 0x00]);

        let result = iterate_records::<std::convert::Infallible>(&corrupted, |_, _, _| Ok(()));
        match result {
            Err(IterateError::Record(e)) => assert_eq!(e.index, 1),
            other => panic!("expected a positional record error, got {other:?}"),
        }
    }
}
