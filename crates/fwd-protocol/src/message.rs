//! Forward Protocol `Message` codec (C2): the three-element
//! `[tag, entries, option]` array, with mode auto-detection on the entries
//! slot (Forward / PackedForward / CompressedPackedForward).

use std::io::{self, Read};

use crate::error::ProtocolError;
use crate::eventtime::EventTime;

/// `[EventTime, record-map]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEntry {
    pub time: EventTime,
    pub record: rmpv::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("missing key {0:?} in record")]
    MissingKey(String),
    #[error("value at {0:?} is not a map")]
    NotAMap(String),
}

impl EventEntry {
    pub fn new(time: EventTime, record: rmpv::Value) -> Self {
        Self { time, record }
    }

    pub fn to_value(&self) -> rmpv::Value {
        rmpv::Value::Array(vec![self.time.to_value(), self.record.clone()])
    }

    pub fn from_value(value: rmpv::Value) -> Result<Self, ProtocolError> {
        match value {
            rmpv::Value::Array(mut items) if items.len() == 2 => {
                let record = items.pop().unwrap();
                let time_value = items.pop().unwrap();
                let time = EventTime::from_value(&time_value)?;
                Ok(Self { time, record })
            }
            other => Err(ProtocolError::Framing(format!(
                "EventEntry must be a 2-element array, got {other:?}"
            ))),
        }
    }

    /// Nested map lookup following `path`, one key per map level. Used by
    /// the splitting file writer to pick the value(s) that name an output
    /// file.
    pub fn resolve_path(&self, path: &[&str]) -> Result<&rmpv::Value, ResolveError> {
        let mut current = &self.record;
        for key in path {
            match current {
                rmpv::Value::Map(entries) => {
                    let found = entries
                        .iter()
                        .find(|(k, _)| k.as_str() == Some(*key))
                        .map(|(_, v)| v);
                    current = found.ok_or_else(|| ResolveError::MissingKey((*key).to_owned()))?;
                }
                _ => return Err(ResolveError::NotAMap((*key).to_owned())),
            }
        }
        Ok(current)
    }
}

/// `TransportOption`: the optional third element of a Message array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOption {
    pub size: Option<u64>,
    pub chunk: Option<String>,
    pub compressed: Option<String>,
}

impl TransportOption {
    pub fn with_chunk(chunk: impl Into<String>) -> Self {
        Self {
            chunk: Some(chunk.into()),
            ..Default::default()
        }
    }

    pub fn from_value(value: &rmpv::Value) -> Result<Self, ProtocolError> {
        match value {
            rmpv::Value::Map(entries) => {
                let mut opt = Self::default();
                for (k, v) in entries {
                    match k.as_str() {
                        Some("size") => opt.size = v.as_u64(),
                        Some("chunk") => {
                            opt.chunk = v.as_str().filter(|s| !s.is_empty()).map(str::to_owned);
                        }
                        Some("compressed") => {
                            opt.compressed =
                                v.as_str().filter(|s| !s.is_empty()).map(str::to_owned);
                        }
                        _ => {}
                    }
                }
                Ok(opt)
            }
            rmpv::Value::Nil => Ok(Self::default()),
            other => Err(ProtocolError::Framing(format!(
                "TransportOption must be a map, got {other:?}"
            ))),
        }
    }

    pub fn to_value(&self) -> rmpv::Value {
        let mut entries = Vec::new();
        if let Some(size) = self.size {
            entries.push((rmpv::Value::from("size"), rmpv::Value::from(size)));
        }
        if let Some(chunk) = &self.chunk {
            entries.push((rmpv::Value::from("chunk"), rmpv::Value::from(chunk.clone())));
        }
        if let Some(compressed) = &self.compressed {
            entries.push((
                rmpv::Value::from("compressed"),
                rmpv::Value::from(compressed.clone()),
            ));
        }
        rmpv::Value::Map(entries)
    }
}

/// A decoded Forward message: `[tag, entries, option]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub tag: String,
    pub entries: Vec<EventEntry>,
    pub option: TransportOption,
}

/// `{"ack": chunk}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub chunk: String,
}

impl Ack {
    pub fn new(chunk: impl Into<String>) -> Self {
        Self {
            chunk: chunk.into(),
        }
    }

    pub fn to_value(&self) -> rmpv::Value {
        rmpv::Value::Map(vec![(
            rmpv::Value::from("ack"),
            rmpv::Value::from(self.chunk.clone()),
        )])
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &self.to_value())?;
        Ok(buf)
    }
}

impl Message {
    pub fn new(tag: impl Into<String>, entries: Vec<EventEntry>, option: TransportOption) -> Self {
        Self {
            tag: tag.into(),
            entries,
            option,
        }
    }

    /// Always emits Forward mode (plain array of entries), as specified in
    /// §4.1 — the core does not need to emit packed or compressed form.
    pub fn to_value(&self) -> rmpv::Value {
        let entries = rmpv::Value::Array(self.entries.iter().map(EventEntry::to_value).collect());
        rmpv::Value::Array(vec![
            rmpv::Value::from(self.tag.clone()),
            entries,
            self.option.to_value(),
        ])
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &self.to_value())?;
        Ok(buf)
    }

    /// Decodes a fully-parsed msgpack value into a Message, detecting the
    /// entries mode from the msgpack type of the second array element.
    pub fn decode_from_value(value: rmpv::Value) -> Result<Self, ProtocolError> {
        let items = match value {
            rmpv::Value::Array(items) if items.len() == 3 => items,
            rmpv::Value::Array(items) => {
                return Err(ProtocolError::Framing(format!(
                    "Message must be a 3-element array, got {} elements",
                    items.len()
                )));
            }
            other => {
                return Err(ProtocolError::Framing(format!(
                    "Message must be an array, got {other:?}"
                )));
            }
        };
        let mut iter = items.into_iter();
        let tag_value = iter.next().unwrap();
        let entries_value = iter.next().unwrap();
        let option_value = iter.next().unwrap();

        let tag = tag_value
            .as_str()
            .ok_or_else(|| ProtocolError::Framing(format!("tag must be a string, got {tag_value:?}")))?
            .to_owned();
        let option = TransportOption::from_value(&option_value)?;

        let entries = match entries_value {
            rmpv::Value::Array(arr) => arr
                .into_iter()
                .map(EventEntry::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            rmpv::Value::Binary(bin) => {
                decode_packed_entries(&bin, option.compressed.as_deref())?
            }
            other => {
                return Err(ProtocolError::Framing(format!(
                    "entries must be an array or binary, got {other:?}"
                )));
            }
        };

        Ok(Self {
            tag,
            entries,
            option,
        })
    }
}

/// Expands a PackedForward (optionally gzip-compressed) bin payload into a
/// sequence of `EventEntry` values. EOF is the terminal condition, not an
/// error — `option.size` is only a capacity hint and is never validated
/// against the actual count.
fn decode_packed_entries(
    bin: &[u8],
    compressed: Option<&str>,
) -> Result<Vec<EventEntry>, ProtocolError> {
    let owned;
    let plain: &[u8] = if compressed == Some("gzip") {
        let mut out = Vec::new();
        flate2::read::MultiGzDecoder::new(bin)
            .read_to_end(&mut out)
            .map_err(ProtocolError::Gzip)?;
        owned = out;
        &owned
    } else {
        bin
    };

    let mut cursor = io::Cursor::new(plain);
    let mut entries = Vec::new();
    let mut index = 0usize;
    loop {
        match rmpv::decode::read_value(&mut cursor) {
            Ok(value) => {
                let entry = EventEntry::from_value(value).map_err(|e| ProtocolError::Corruption {
                    index,
                    reason: e.to_string(),
                })?;
                entries.push(entry);
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
                return Err(ProtocolError::Corruption {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(entries)
}
