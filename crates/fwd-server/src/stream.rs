//! Type-erases plain TCP vs. TLS connections after accept, so the rest of
//! the connection runner doesn't need to be generic over the stream type
//! (§4.2 — TLS is a per-listener toggle, not a protocol variant).

use std::sync::Arc;

use tokio::io::{split, AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

pub type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Completes the TLS handshake if `tls_config` is set, then splits into
/// boxed halves: one for the connection's read loop, one handed to the
/// ACK writer task.
pub async fn accept(
    tcp: TcpStream,
    tls_config: Option<Arc<rustls::ServerConfig>>,
) -> std::io::Result<(BoxedRead, BoxedWrite)> {
    match tls_config {
        Some(cfg) => {
            let acceptor = TlsAcceptor::from(cfg);
            let tls_stream = acceptor.accept(tcp).await?;
            let (read_half, write_half) = split(tls_stream);
            Ok((Box::new(read_half), Box::new(write_half)))
        }
        None => {
            let (read_half, write_half) = split(tcp);
            Ok((Box::new(read_half), Box::new(write_half)))
        }
    }
}
