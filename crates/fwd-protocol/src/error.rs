use std::io;

/// Errors that can occur while decoding or encoding Forward Protocol wire
/// data. Framing/corruption errors are connection-local; I/O errors bubble
/// from the underlying transport.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("framing error: {0}")]
    Framing(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("msgpack decode error: {0}")]
    Decode(#[from] rmpv::decode::Error),

    #[error("msgpack encode error: {0}")]
    Encode(#[from] rmpv::encode::Error),

    #[error("gzip decompression error: {0}")]
    Gzip(io::Error),

    #[error("corrupt entry at ordinal {index}: {reason}")]
    Corruption { index: usize, reason: String },
}

impl ProtocolError {
    /// True if the underlying cause was an unexpected end of stream while
    /// reading a value header — the caller should treat this as "need more
    /// bytes" rather than a hard failure when peeling a single frame off a
    /// growing buffer.
    pub fn is_unexpected_eof(&self) -> bool {
        match self {
            ProtocolError::Decode(rmpv::decode::Error::InvalidMarkerRead(e))
            | ProtocolError::Decode(rmpv::decode::Error::InvalidDataRead(e)) => {
                e.kind() == io::ErrorKind::UnexpectedEof
            }
            ProtocolError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
