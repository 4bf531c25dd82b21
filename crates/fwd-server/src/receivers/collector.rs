//! `MessageCollector` / `EventCollector` (C5): push decoded values onto a
//! bounded channel for a test to drain; `Accept` times out if the channel
//! isn't drained in time.

use std::time::Duration;

use fwd_protocol::{EventEntry, Message};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::receiver::{ClientMessage, Receiver, ReceiverError};

const CHANNEL_CAPACITY: usize = 100;

pub struct MessageCollector {
    tx: Option<mpsc::Sender<Message>>,
    timeout: Duration,
}

impl MessageCollector {
    pub fn new(timeout: Duration) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                tx: Some(tx),
                timeout,
            },
            rx,
        )
    }
}

#[async_trait::async_trait]
impl Receiver for MessageCollector {
    async fn accept(&mut self, msg: ClientMessage) -> Result<(), ReceiverError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ReceiverError::Other("collector already ended".into()))?;
        tokio::time::timeout(self.timeout, tx.send(msg.message))
            .await
            .map_err(|_| ReceiverError::Timeout(self.timeout))?
            .map_err(|_| ReceiverError::Other("message channel closed".into()))
    }

    async fn end(&mut self) -> Result<(), ReceiverError> {
        self.tx = None;
        Ok(())
    }
}

pub struct EventCollector {
    tx: Option<mpsc::Sender<EventEntry>>,
    timeout: Duration,
}

impl EventCollector {
    pub fn new(timeout: Duration) -> (Self, mpsc::Receiver<EventEntry>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                tx: Some(tx),
                timeout,
            },
            rx,
        )
    }
}

#[async_trait::async_trait]
impl Receiver for EventCollector {
    async fn accept(&mut self, msg: ClientMessage) -> Result<(), ReceiverError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ReceiverError::Other("collector already ended".into()))?;
        // A single deadline covers every entry in the message, matching
        // the reference behavior of timing the whole batch rather than
        // each entry individually.
        let deadline = Instant::now() + self.timeout;
        for entry in msg.message.entries {
            tokio::time::timeout_at(deadline, tx.send(entry))
                .await
                .map_err(|_| ReceiverError::Timeout(self.timeout))?
                .map_err(|_| ReceiverError::Other("event channel closed".into()))?;
        }
        Ok(())
    }

    async fn end(&mut self) -> Result<(), ReceiverError> {
        self.tx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwd_protocol::{EventTime, TransportOption};

    fn msg(tag: &str) -> Message {
        Message::new(
            tag,
            vec![EventEntry::new(EventTime::new(1, 0), rmpv::Value::Map(vec![]))],
            TransportOption::default(),
        )
    }

    #[tokio::test]
    async fn message_collector_forwards_accepted_messages() {
        let (mut collector, mut rx) = MessageCollector::new(Duration::from_millis(200));
        collector
            .accept(ClientMessage {
                conn_id: 1,
                message: msg("a"),
            })
            .await
            .unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.tag, "a");
    }

    #[tokio::test]
    async fn message_collector_times_out_when_channel_is_full() {
        let (mut collector, _rx) = MessageCollector::new(Duration::from_millis(20));
        for _ in 0..CHANNEL_CAPACITY {
            collector
                .accept(ClientMessage {
                    conn_id: 1,
                    message: msg("a"),
                })
                .await
                .unwrap();
        }
        let err = collector
            .accept(ClientMessage {
                conn_id: 1,
                message: msg("a"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiverError::Timeout(_)));
    }

    #[tokio::test]
    async fn event_collector_forwards_each_entry() {
        let (mut collector, mut rx) = EventCollector::new(Duration::from_millis(200));
        let mut two_entries = msg("a");
        two_entries.entries.push(EventEntry::new(
            EventTime::new(2, 0),
            rmpv::Value::Map(vec![]),
        ));
        collector
            .accept(ClientMessage {
                conn_id: 1,
                message: two_entries,
            })
            .await
            .unwrap();
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
    }
}
