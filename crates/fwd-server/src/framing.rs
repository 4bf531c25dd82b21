//! A single growable read buffer shared across the handshake exchange and
//! the message read loop of one connection, so no bytes are lost between
//! the two phases.

use bytes::{Buf, BytesMut};
use fwd_protocol::ProtocolError;
use tokio::io::{AsyncRead, AsyncReadExt};

pub struct FrameReader<R> {
    reader: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Decodes exactly one msgpack value, reading more bytes from the
    /// underlying stream as needed.
    pub async fn read_value(&mut self) -> Result<rmpv::Value, ProtocolError> {
        loop {
            if !self.buf.is_empty() {
                let (consumed, result) = {
                    let mut cursor = std::io::Cursor::new(&self.buf[..]);
                    let result =
                        rmpv::decode::read_value(&mut cursor).map_err(ProtocolError::Decode);
                    (cursor.position() as usize, result)
                };
                match result {
                    Ok(value) => {
                        self.buf.advance(consumed);
                        return Ok(value);
                    }
                    Err(e) if !e.is_unexpected_eof() => return Err(e),
                    Err(_) => {} // fall through, need more bytes
                }
            }
            let n = self
                .reader
                .read_buf(&mut self.buf)
                .await
                .map_err(ProtocolError::Io)?;
            if n == 0 {
                return Err(ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed while reading a frame",
                )));
            }
        }
    }
}
