//! Dump/replay (C8): decodes `.flb` chunk files, `.ff` single-Message
//! files, and directories of either, rendering decoded events as JSON
//! (§4.7). Not performance-critical — for testing and debugging only.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fwd_protocol::{chunk, json, EventEntry, Message, ProtocolError};

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("I/O error reading {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed chunk file {path}: {source}")]
    Chunk {
        path: PathBuf,
        source: chunk::ChunkError,
    },
    #[error("corrupt record in {path}: {source}")]
    Record {
        path: PathBuf,
        source: chunk::IterateError<io::Error>,
    },
    #[error("malformed message in {path}: {source}")]
    Protocol { path: PathBuf, source: ProtocolError },
}

/// Walks `paths` (files or directories, recursively) and writes decoded
/// events as JSON to `out`. When `ignore_error` is set, a per-file failure
/// is logged and skipped rather than aborting the whole walk.
pub fn dump_paths(
    paths: &[PathBuf],
    indented: bool,
    ignore_error: bool,
    out: &mut impl Write,
) -> Result<(), DumpError> {
    for path in paths {
        for file in walk(path) {
            if let Err(e) = dump_file(&file, indented, out) {
                if ignore_error {
                    tracing::error!(path = %file.display(), error = %e, "skipping file");
                } else {
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}

fn walk(path: &Path) -> Vec<PathBuf> {
    if path.is_dir() {
        walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    } else {
        vec![path.to_owned()]
    }
}

/// Dispatches a single file by extension: `.flb` as a Fluent Bit chunk,
/// `.ff` as one Forward Protocol Message, anything else as a raw stream of
/// msgpack values rendered one-per-line.
pub fn dump_file(path: &Path, indented: bool, out: &mut impl Write) -> Result<(), DumpError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("flb") => dump_flb_file(path, indented, out),
        Some("ff") => dump_ff_file(path, indented, out),
        _ => dump_generic_file(path, indented, out),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, DumpError> {
    fs::read(path).map_err(|e| DumpError::Io {
        path: path.to_owned(),
        source: e,
    })
}

fn dump_flb_file(path: &Path, indented: bool, out: &mut impl Write) -> Result<(), DumpError> {
    let bytes = read_file(path)?;
    let (tag, payload) = chunk::parse_chunk(&bytes).map_err(|e| DumpError::Chunk {
        path: path.to_owned(),
        source: e,
    })?;

    let mut entries: Vec<EventEntry> = Vec::new();
    chunk::iterate_records::<io::Error>(payload, |entry, _start, _end| {
        entries.push(entry);
        Ok(())
    })
    .map_err(|e| DumpError::Record {
        path: path.to_owned(),
        source: e,
    })?;

    json::write_entries_array(out, tag, &entries, indented).map_err(|e| DumpError::Io {
        path: path.to_owned(),
        source: e,
    })
}

fn dump_ff_file(path: &Path, indented: bool, out: &mut impl Write) -> Result<(), DumpError> {
    let bytes = read_file(path)?;
    let value = rmpv::decode::read_value(&mut io::Cursor::new(&bytes[..])).map_err(|e| {
        DumpError::Protocol {
            path: path.to_owned(),
            source: ProtocolError::Decode(e),
        }
    })?;
    let message = Message::decode_from_value(value).map_err(|e| DumpError::Protocol {
        path: path.to_owned(),
        source: e,
    })?;
    json::write_entries_array(out, &message.tag, &message.entries, indented).map_err(|e| {
        DumpError::Io {
            path: path.to_owned(),
            source: e,
        }
    })
}

/// No chunk tag or Message framing is known for a generic file: each
/// top-level msgpack value is decoded standalone and rendered as its own
/// JSON line, continuing until EOF.
fn dump_generic_file(path: &Path, indented: bool, out: &mut impl Write) -> Result<(), DumpError> {
    let bytes = read_file(path)?;
    let mut cursor = io::Cursor::new(&bytes[..]);
    loop {
        match rmpv::decode::read_value(&mut cursor) {
            Ok(value) => {
                let json_value = serde_json::to_value(&value).unwrap_or(serde_json::Value::Null);
                let rendered = if indented {
                    serde_json::to_string_pretty(&json_value)
                } else {
                    serde_json::to_string(&json_value)
                }
                .map_err(|e| DumpError::Io {
                    path: path.to_owned(),
                    source: io::Error::other(e),
                })?;
                writeln!(out, "{rendered}").map_err(|e| DumpError::Io {
                    path: path.to_owned(),
                    source: e,
                })?;
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
                return Err(DumpError::Protocol {
                    path: path.to_owned(),
                    source: ProtocolError::Decode(e),
                });
            }
        }
    }
    Ok(())
}
