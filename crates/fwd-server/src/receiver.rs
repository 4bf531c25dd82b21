//! Receiver interface (C5): a pluggable sink for decoded messages, driven
//! exclusively by the single writer task. The server guarantees `accept`
//! and `tick` never overlap and that `end` is called exactly once, after
//! every `accept`.

use std::time::Duration;

use fwd_protocol::Message;

/// A decoded Message plus the connection ID assigned on accept.
/// Connection IDs are globally monotonic, starting at 1.
#[derive(Debug, Clone)]
pub struct ClientMessage {
    pub conn_id: u64,
    pub message: Message,
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

/// Any error from a Receiver is fatal to the server process — a silent
/// sink is worse than a crash for a test server whose entire purpose is
/// its output (§7).
///
/// `accept`/`tick`/`end` are async to let built-ins like `EventCollector`
/// suspend on a full channel instead of blocking the writer task's
/// executor thread; the server still guarantees they never run
/// concurrently with each other and that `end` runs exactly once, after
/// every `accept`.
#[async_trait::async_trait]
pub trait Receiver: Send {
    async fn accept(&mut self, msg: ClientMessage) -> Result<(), ReceiverError>;
    async fn tick(&mut self) -> Result<(), ReceiverError> {
        Ok(())
    }
    async fn end(&mut self) -> Result<(), ReceiverError> {
        Ok(())
    }
}
