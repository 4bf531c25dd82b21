//! Stateful HELO/PING/PONG exchange (C4): I/O, nonce/salt generation, and
//! digest verification on both sides. Wire framing for the three record
//! types lives in `fwd_protocol::handshake`.

use fwd_protocol::{shared_key_digest, Helo, Ping, Pong, ProtocolError};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::framing::FrameReader;
use crate::rng;

async fn write_value<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &rmpv::Value,
) -> Result<(), ProtocolError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_owned())
}

/// Server side of the handshake (§4.3). `auth_fn` is given
/// `(client_hostname, username, password)` and returns `(accept, reason)`
/// — it is where fault injection (`random_fail_auth`) hooks in. A
/// non-accept outcome is not a network error: PONG is still sent so the
/// client can learn why.
pub async fn do_server_handshake<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut W,
    shared_key: &str,
    auth_fn: impl FnOnce(&str, &str, &str) -> (bool, String),
) -> Result<bool, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let nonce = rng::random_decimal_token();
    let helo = Helo {
        nonce: nonce.clone(),
        auth: String::new(),
        keepalive: true,
    };
    write_value(writer, &helo.to_value()).await?;

    let ping_value = reader.read_value().await?;
    let ping = Ping::from_value(ping_value)?;

    let (accept, reason) = auth_fn(&ping.client_hostname, &ping.username, &ping.password);

    let server_hostname = local_hostname();
    let digest = shared_key_digest(
        &ping.shared_key_salt,
        &server_hostname,
        &nonce,
        shared_key,
    );
    let pong = Pong {
        auth_result: accept,
        reason,
        server_hostname,
        shared_key_hexdigest: digest,
    };
    write_value(writer, &pong.to_value()).await?;

    Ok(accept)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientHandshakeResult {
    Success,
    Rejected(String),
    BadDigest,
}

/// Client side of the handshake (§4.3), used by the test handshake
/// helper. A digest mismatch is a logical failure, not a network error —
/// callers distinguish it from `ProtocolError`.
pub async fn do_client_handshake<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut W,
    shared_key: &str,
) -> Result<ClientHandshakeResult, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let helo_value = reader.read_value().await?;
    let helo = Helo::from_value(helo_value)?;

    let salt = rng::random_decimal_token();
    let hostname = local_hostname();
    let ping = Ping {
        client_hostname: hostname.clone(),
        shared_key_salt: salt.clone(),
        shared_key_hexdigest: shared_key_digest(&salt, &hostname, &helo.nonce, shared_key),
        username: String::new(),
        password: String::new(),
    };
    write_value(writer, &ping.to_value()).await?;

    let pong_value = reader.read_value().await?;
    let pong = Pong::from_value(pong_value)?;

    let expected_digest = shared_key_digest(&salt, &pong.server_hostname, &helo.nonce, shared_key);
    if expected_digest != pong.shared_key_hexdigest {
        return Ok(ClientHandshakeResult::BadDigest);
    }
    if pong.auth_result {
        Ok(ClientHandshakeResult::Success)
    } else {
        Ok(ClientHandshakeResult::Rejected(pong.reason))
    }
}
