//! JSON rendering shared by the `MessageWriter`/`SplittingFileWriter`
//! receivers and the `dump` command (§4.7): every decoded `EventEntry`
//! becomes a `[tag, seconds_as_float, record]` triple, and a run of
//! entries is wrapped as a JSON array with a leading `[\n`, `,\n` between
//! entries, and a closing `\n]\n`.

use std::io::{self, Write};

use crate::message::EventEntry;

pub fn entry_triple(tag: &str, entry: &EventEntry) -> serde_json::Value {
    let record = serde_json::to_value(&entry.record).unwrap_or(serde_json::Value::Null);
    serde_json::json!([tag, entry.time.as_unix_seconds_f64(), record])
}

pub fn write_array_open<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "[\n")
}

pub fn write_array_separator<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, ",\n")
}

pub fn write_array_close<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "\n]\n")
}

/// Writes one entry's triple, no wrapping punctuation — callers own array
/// framing via `write_array_open`/`write_array_separator`/`write_array_close`.
pub fn write_entry_json<W: Write>(
    out: &mut W,
    tag: &str,
    entry: &EventEntry,
    indented: bool,
) -> io::Result<()> {
    let value = entry_triple(tag, entry);
    if indented {
        write!(out, "{}", serde_json::to_string_pretty(&value)?)
    } else {
        write!(out, "{}", serde_json::to_string(&value)?)
    }
}

/// Renders a full Message's entries as one bracketed JSON array.
pub fn write_entries_array<W: Write>(
    out: &mut W,
    tag: &str,
    entries: &[EventEntry],
    indented: bool,
) -> io::Result<()> {
    write_array_open(out)?;
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            write_array_separator(out)?;
        }
        write_entry_json(out, tag, entry, indented)?;
    }
    write_array_close(out)
}
