//! Per-connection state machine (C6): handshake, read loop, and the five
//! fault-injection knobs (§4.5, §4.6).

use std::net::SocketAddr;
use std::sync::Arc;

use fwd_protocol::Message;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::{
    FaultConfig, BATCH_SEND_TIMEOUT, FAULT_NO_RECEIVING_SLEEP, FAULT_SLEEP, HANDSHAKE_TIMEOUT,
};
use crate::framing::FrameReader;
use crate::handshake::do_server_handshake;
use crate::receiver::ClientMessage;
use crate::registry::ConnectionRegistry;
use crate::{acker, rng, stream};

pub struct ConnectionParams {
    pub conn_id: u64,
    pub peer_addr: SocketAddr,
    pub tls_config: Option<Arc<rustls::ServerConfig>>,
    pub shared_secret: Option<String>,
    pub fault: FaultConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub output_tx: mpsc::Sender<ClientMessage>,
}

/// Drives one accepted connection end to end. Never panics on a
/// misbehaving client: every failure just ends this task and deregisters
/// the connection.
pub async fn run(tcp: TcpStream, params: ConnectionParams) {
    let ConnectionParams {
        conn_id,
        peer_addr,
        tls_config,
        shared_secret,
        fault,
        registry,
        output_tx,
    } = params;

    let notify = registry.register(peer_addr);

    if rng::roll() < fault.random_no_handshake {
        tracing::debug!(%peer_addr, "random_no_handshake: sleeping without responding");
        tokio::select! {
            _ = tokio::time::sleep(FAULT_SLEEP) => {}
            _ = notify.notified() => {}
        }
        registry.deregister(peer_addr);
        return;
    }

    let (read_half, write_half) = match stream::accept(tcp, tls_config).await {
        Ok(halves) => halves,
        Err(e) => {
            tracing::warn!(%peer_addr, error = %e, "TLS accept failed");
            registry.deregister(peer_addr);
            return;
        }
    };

    let mut reader = FrameReader::new(read_half);
    let mut write_half = write_half;

    if let Some(secret) = &shared_secret {
        let fail_auth_p = fault.random_fail_auth;
        let accepted = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            do_server_handshake(&mut reader, &mut write_half, secret, |_, _, _| {
                if rng::roll() < fail_auth_p {
                    (false, "forced authentication failure".to_owned())
                } else {
                    (true, String::new())
                }
            }),
        )
        .await;
        match accepted {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                tracing::info!(%peer_addr, "handshake rejected");
                registry.deregister(peer_addr);
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!(%peer_addr, error = %e, "handshake I/O error");
                registry.deregister(peer_addr);
                return;
            }
            Err(_elapsed) => {
                tracing::info!(%peer_addr, "handshake timed out");
                registry.deregister(peer_addr);
                return;
            }
        }
    }

    let ack_tx = acker::spawn(write_half);
    let mut no_response_latched = false;

    loop {
        tokio::select! {
            _ = notify.notified() => {
                tracing::debug!(%peer_addr, "connection force-closed");
                break;
            }
            read_result = tokio::time::timeout(BATCH_SEND_TIMEOUT, reader.read_value()) => {
                let value = match read_result {
                    Err(_) => {
                        tracing::debug!(%peer_addr, "idle timeout waiting for next batch");
                        break;
                    }
                    Ok(Err(e)) if e.is_unexpected_eof() => {
                        tracing::debug!(%peer_addr, "connection closed by peer");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(%peer_addr, error = %e, "frame decode error");
                        break;
                    }
                    Ok(Ok(value)) => value,
                };

                if rng::roll() < fault.random_no_receiving {
                    tracing::debug!(%peer_addr, "random_no_receiving: discarding batch silently");
                    tokio::select! {
                        _ = tokio::time::sleep(FAULT_NO_RECEIVING_SLEEP) => {}
                        _ = notify.notified() => break,
                    }
                    continue;
                }

                let message = match Message::decode_from_value(value) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(%peer_addr, error = %e, "malformed message");
                        break;
                    }
                };

                let kill_conn = rng::roll() < fault.random_kill_conn;

                if !no_response_latched && rng::roll() < fault.random_no_response {
                    tracing::debug!(%peer_addr, "random_no_response: latched for remainder of connection");
                    no_response_latched = true;
                }

                let chunk = message.option.chunk.clone();

                if output_tx
                    .send(ClientMessage { conn_id, message })
                    .await
                    .is_err()
                {
                    tracing::warn!(%peer_addr, "server output channel closed, ending connection");
                    break;
                }

                if kill_conn {
                    tracing::debug!(%peer_addr, "random_kill_conn: dropping connection after delivery, before any ack");
                    break;
                }

                if let Some(chunk) = chunk {
                    if !no_response_latched && ack_tx.send(chunk).await.is_err() {
                        tracing::warn!(%peer_addr, "ack writer gone, ending connection");
                        break;
                    }
                }
            }
        }
    }

    drop(ack_tx);
    registry.deregister(peer_addr);
}
