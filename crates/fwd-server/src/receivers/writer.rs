//! `MessageWriter` (C5): writes the JSON representation of every accepted
//! message to a buffered output stream.

use std::io::{BufWriter, Write};

use fwd_protocol::json;

use crate::receiver::{ClientMessage, Receiver, ReceiverError};

pub struct MessageWriter<W: Write + Send> {
    writer: BufWriter<W>,
    indented: bool,
}

impl<W: Write + Send> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            indented: false,
        }
    }

    pub fn indented(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            indented: true,
        }
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> Receiver for MessageWriter<W> {
    async fn accept(&mut self, msg: ClientMessage) -> Result<(), ReceiverError> {
        json::write_entries_array(
            &mut self.writer,
            &msg.message.tag,
            &msg.message.entries,
            self.indented,
        )?;
        Ok(())
    }

    async fn tick(&mut self) -> Result<(), ReceiverError> {
        self.writer.flush()?;
        Ok(())
    }

    async fn end(&mut self) -> Result<(), ReceiverError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwd_protocol::{EventEntry, EventTime, Message, TransportOption};

    #[tokio::test]
    async fn accept_writes_a_json_array_per_message() {
        let mut writer = MessageWriter::new(Vec::new());
        writer
            .accept(ClientMessage {
                conn_id: 1,
                message: Message::new(
                    "hello",
                    vec![EventEntry::new(
                        EventTime::new(10, 0),
                        rmpv::Value::Map(vec![]),
                    )],
                    TransportOption::default(),
                ),
            })
            .await
            .unwrap();
        writer.end().await.unwrap();
        let out = String::from_utf8(writer.writer.into_inner().unwrap()).unwrap();
        assert!(out.starts_with("[\n"));
        assert!(out.contains("hello"));
        assert!(out.ends_with("\n]\n"));
    }
}
