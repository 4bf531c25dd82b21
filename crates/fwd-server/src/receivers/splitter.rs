//! `SplittingFileWriter` (C5): routes each event into a file named from
//! the tag and the values at configured record paths.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use fwd_protocol::{json, EventEntry};

use crate::receiver::{ClientMessage, Receiver, ReceiverError};

#[derive(Debug, thiserror::Error)]
pub enum SplitterError {
    #[error("path_format must contain exactly one substitution point \"{{}}\": {0:?}")]
    BadPathFormat(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validates that `path_format` contains exactly one `{}` substitution
/// point, the Rust analog of the reference implementation's probe-based
/// `VerifySplittingFilePath` (format once, check for `%!`-style
/// formatting artifacts).
pub fn verify_splitting_file_path(path_format: &str) -> Result<(), SplitterError> {
    if path_format.matches("{}").count() == 1 {
        Ok(())
    } else {
        Err(SplitterError::BadPathFormat(path_format.to_owned()))
    }
}

fn format_path(path_format: &str, title: &str) -> PathBuf {
    PathBuf::from(path_format.replacen("{}", title, 1))
}

fn display_value(value: &rmpv::Value) -> String {
    match value {
        rmpv::Value::String(s) => s.as_str().unwrap_or_default().to_owned(),
        rmpv::Value::Nil => "nil".to_owned(),
        other => other.to_string(),
    }
}

struct SplitOutput {
    writer: BufWriter<File>,
    path: PathBuf,
}

pub struct SplittingFileWriter {
    keys: Vec<String>,
    path_format: String,
    strict: bool,
    conn_id_to_title: HashMap<u64, String>,
    title_to_output: HashMap<String, SplitOutput>,
}

impl SplittingFileWriter {
    pub fn new(keys: Vec<String>, path_format: String, strict: bool) -> Result<Self, SplitterError> {
        verify_splitting_file_path(&path_format)?;
        Ok(Self {
            keys,
            path_format,
            strict,
            conn_id_to_title: HashMap::new(),
            title_to_output: HashMap::new(),
        })
    }

    fn make_event_title(&self, entry: &EventEntry, tag: &str) -> String {
        let sanitized_tag = tag.replace('/', "_");
        if self.keys.is_empty() {
            return sanitized_tag;
        }
        let values: Vec<String> = self
            .keys
            .iter()
            .map(|key| {
                let path: Vec<&str> = key.split('/').collect();
                match entry.resolve_path(&path) {
                    Ok(v) => display_value(v),
                    Err(e) => {
                        if self.strict {
                            tracing::error!(key = %key, error = %e, "missing key field for split title");
                        }
                        String::new()
                    }
                }
            })
            .collect();
        format!("{sanitized_tag}-{}", values.join(","))
    }

    fn accept_event(&mut self, entry: EventEntry, tag: &str, conn_id: u64) -> Result<(), ReceiverError> {
        let title = self.make_event_title(&entry, tag);
        let is_first = !self.title_to_output.contains_key(&title);

        if is_first {
            let path = format_path(&self.path_format, &title);
            let file = File::create(&path)?;
            tracing::info!(path = %path.display(), "created split output file");
            self.title_to_output.insert(
                title.clone(),
                SplitOutput {
                    writer: BufWriter::new(file),
                    path,
                },
            );
        }

        if self.strict {
            match self.conn_id_to_title.get(&conn_id) {
                Some(last_title) if last_title != &title => {
                    tracing::error!(
                        old_title = %last_title,
                        new_title = %title,
                        "incoming connection changed tag or key fields"
                    );
                    self.conn_id_to_title.insert(conn_id, title.clone());
                }
                Some(_) => {}
                None => {
                    self.conn_id_to_title.insert(conn_id, title.clone());
                }
            }
        }

        let output = self.title_to_output.get_mut(&title).expect("just inserted");
        if is_first {
            json::write_array_open(&mut output.writer)?;
        } else {
            json::write_array_separator(&mut output.writer)?;
        }
        json::write_entry_json(&mut output.writer, tag, &entry, true)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Receiver for SplittingFileWriter {
    async fn accept(&mut self, msg: ClientMessage) -> Result<(), ReceiverError> {
        if msg.message.entries.is_empty() {
            return Ok(());
        }
        let tag = msg.message.tag.clone();
        let conn_id = msg.conn_id;
        for entry in msg.message.entries {
            self.accept_event(entry, &tag, conn_id)?;
        }
        Ok(())
    }

    async fn tick(&mut self) -> Result<(), ReceiverError> {
        for output in self.title_to_output.values_mut() {
            output.writer.flush()?;
        }
        Ok(())
    }

    async fn end(&mut self) -> Result<(), ReceiverError> {
        for output in self.title_to_output.values_mut() {
            json::write_array_close(&mut output.writer)?;
            output.writer.flush()?;
            tracing::debug!(path = %output.path.display(), "closed split output file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwd_protocol::{EventTime, Message, TransportOption};
    use tempfile::tempdir;

    fn entry_with(key: &str, value: &str) -> EventEntry {
        EventEntry::new(
            EventTime::new(1, 0),
            rmpv::Value::Map(vec![(rmpv::Value::from(key), rmpv::Value::from(value))]),
        )
    }

    #[test]
    fn rejects_path_format_without_placeholder() {
        assert!(verify_splitting_file_path("/tmp/out.json").is_err());
        assert!(verify_splitting_file_path("/tmp/{}-{}-out.json").is_err());
        assert!(verify_splitting_file_path("/tmp/{}-out.json").is_ok());
    }

    #[tokio::test]
    async fn splits_output_files_by_key_value_and_brackets_json() {
        let dir = tempdir().unwrap();
        let path_format = dir.path().join("{}.json").to_string_lossy().into_owned();
        let mut writer = SplittingFileWriter::new(vec!["host".into()], path_format, false).unwrap();

        writer
            .accept(ClientMessage {
                conn_id: 1,
                message: Message::new(
                    "app",
                    vec![entry_with("host", "web-1"), entry_with("host", "web-2")],
                    TransportOption::default(),
                ),
            })
            .await
            .unwrap();
        writer.end().await.unwrap();

        let web1 = std::fs::read_to_string(dir.path().join("app-web-1.json")).unwrap();
        assert!(web1.starts_with("[\n"));
        assert!(web1.ends_with("\n]\n"));
        let web2 = std::fs::read_to_string(dir.path().join("app-web-2.json")).unwrap();
        assert!(web2.contains("web-2"));
    }

    #[tokio::test]
    async fn groups_multiple_events_into_one_file_when_key_repeats() {
        let dir = tempdir().unwrap();
        let path_format = dir.path().join("{}.json").to_string_lossy().into_owned();
        let mut writer = SplittingFileWriter::new(vec!["host".into()], path_format, false).unwrap();

        writer
            .accept(ClientMessage {
                conn_id: 1,
                message: Message::new(
                    "app",
                    vec![entry_with("host", "web-1"), entry_with("host", "web-1")],
                    TransportOption::default(),
                ),
            })
            .await
            .unwrap();
        writer.end().await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("app-web-1.json")).unwrap();
        assert_eq!(contents.matches(",\n").count(), 1);
    }
}
