//! A Forward Protocol client for integration tests — connects (plain TCP
//! or TLS), optionally performs the shared-secret handshake, and
//! sends/receives Messages and Acks. Not part of the server; only ever
//! built under `[dev-dependencies]`.

pub mod tls;

use std::io;

use fwd_protocol::{Ack, Message, ProtocolError};
use fwd_server::config::HANDSHAKE_TIMEOUT;
use fwd_server::framing::FrameReader;
use fwd_server::handshake::{do_client_handshake, ClientHandshakeResult};
use fwd_server::stream::{BoxedRead, BoxedWrite};
use tokio::io::split;
use tokio::net::TcpStream;

pub use fwd_server::handshake::ClientHandshakeResult as HandshakeResult;

pub struct TestClient {
    reader: FrameReader<BoxedRead>,
    writer: BoxedWrite,
}

impl TestClient {
    /// Connects and, if `shared_secret` is set, performs the handshake.
    /// Returns an error if the connection or handshake I/O fails; a
    /// handshake the server rejected or a bad digest is surfaced as
    /// `HandshakeResult` via [`TestClient::connect_and_handshake`] instead.
    pub async fn connect(addr: &str, shared_secret: Option<&str>, use_tls: bool) -> io::Result<Self> {
        let (client, outcome) = Self::connect_and_handshake(addr, shared_secret, use_tls).await?;
        match outcome {
            None | Some(ClientHandshakeResult::Success) => Ok(client),
            Some(other) => Err(io::Error::other(format!("handshake did not succeed: {other:?}"))),
        }
    }

    /// Connects and runs the handshake if `shared_secret` is set, returning
    /// the outcome instead of collapsing a rejection into an `Err`. Used by
    /// tests that deliberately probe a wrong shared secret.
    pub async fn connect_and_handshake(
        addr: &str,
        shared_secret: Option<&str>,
        use_tls: bool,
    ) -> io::Result<(Self, Option<ClientHandshakeResult>)> {
        let tcp = TcpStream::connect(addr).await?;
        let (read_half, write_half): (BoxedRead, BoxedWrite) = if use_tls {
            let tls_stream = tls::connect(tcp, "localhost").await?;
            let (r, w) = split(tls_stream);
            (Box::new(r), Box::new(w))
        } else {
            let (r, w) = split(tcp);
            (Box::new(r), Box::new(w))
        };

        let mut reader = FrameReader::new(read_half);
        let mut writer = write_half;

        let outcome = match shared_secret {
            Some(secret) => Some(
                tokio::time::timeout(
                    HANDSHAKE_TIMEOUT,
                    do_client_handshake(&mut reader, &mut writer, secret),
                )
                .await
                .map_err(|_elapsed| io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"))?
                .map_err(protocol_to_io)?,
            ),
            None => None,
        };

        Ok((Self { reader, writer }, outcome))
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), ProtocolError> {
        self.send_value(&message.to_value()).await
    }

    /// Writes an arbitrary msgpack value on the wire, bypassing `Message`'s
    /// own encoder. Used by tests that need to emit a specific entries
    /// encoding mode (PackedForward, CompressedPackedForward) that
    /// `Message::to_value` never produces on its own.
    pub async fn send_value(&mut self, value: &rmpv::Value) -> Result<(), ProtocolError> {
        use tokio::io::AsyncWriteExt;
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, value)?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn recv_ack(&mut self) -> Result<Ack, ProtocolError> {
        let value = self.reader.read_value().await?;
        let map = value
            .as_map()
            .ok_or_else(|| ProtocolError::Framing(format!("expected ack map, got {value:?}")))?;
        let chunk = map
            .iter()
            .find(|(k, _)| k.as_str() == Some("ack"))
            .and_then(|(_, v)| v.as_str())
            .ok_or_else(|| ProtocolError::Framing("ack map missing \"ack\" field".into()))?
            .to_owned();
        Ok(Ack::new(chunk))
    }
}

fn protocol_to_io(e: ProtocolError) -> io::Error {
    io::Error::other(e)
}
