//! Server lifecycle (C7): bind, accept loop, writer loop that drains
//! decoded messages into a `Receiver` on a fixed tick, and graceful
//! shutdown.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{ServerConfig, TICK_INTERVAL, WRITER_ENDING_TIMEOUT};
use crate::connection::{self, ConnectionParams};
use crate::receiver::{ClientMessage, Receiver};
use crate::registry::ConnectionRegistry;
use crate::tls;

const OUTPUT_CHANNEL_CAPACITY: usize = 1000;

pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    accept_task: JoinHandle<()>,
    writer_task: JoinHandle<bool>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections, force-closes every registered
    /// connection, closes the output channel, and waits (bounded by
    /// `WRITER_ENDING_TIMEOUT`) for the writer task to call `Receiver::end`
    /// and exit.
    ///
    /// Returns `true` if the Receiver ever returned an error (a process-fatal
    /// condition per §7) or if the writer task panicked or had to be
    /// aborted after missing the ending deadline — callers (the CLI) use
    /// this to choose a non-zero exit code.
    pub async fn shutdown(mut self) -> bool {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.accept_task.await;
        match tokio::time::timeout(WRITER_ENDING_TIMEOUT, &mut self.writer_task).await {
            Ok(Ok(receiver_failed)) => receiver_failed,
            Ok(Err(join_err)) => {
                tracing::error!(error = %join_err, "writer task panicked");
                true
            }
            Err(_elapsed) => {
                tracing::warn!("writer task did not finish within the ending timeout, aborting");
                self.writer_task.abort();
                true
            }
        }
    }
}

/// Binds the listener and starts the accept and writer tasks. Returns
/// once the listener is bound, before any connection is served.
pub async fn launch_server(
    config: ServerConfig,
    receiver: Box<dyn Receiver>,
) -> std::io::Result<ServerHandle> {
    let listener = TcpListener::bind(&config.listen_addr).await?;
    let local_addr = listener.local_addr()?;

    let tls_config = if config.tls {
        Some(tls::dev_server_config())
    } else {
        None
    };

    let registry = ConnectionRegistry::new();
    let (output_tx, output_rx) = mpsc::channel::<ClientMessage>(OUTPUT_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let writer_task = tokio::spawn(run_writer(receiver, output_rx));
    let accept_task = tokio::spawn(run_acceptor(
        listener,
        config.shared_secret,
        tls_config,
        config.fault,
        registry.clone(),
        output_tx,
        shutdown_rx,
    ));

    Ok(ServerHandle {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        accept_task,
        writer_task,
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_acceptor(
    listener: TcpListener,
    shared_secret: Option<String>,
    tls_config: Option<Arc<rustls::ServerConfig>>,
    fault: crate::config::FaultConfig,
    registry: Arc<ConnectionRegistry>,
    output_tx: mpsc::Sender<ClientMessage>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let next_conn_id = AtomicU64::new(1);
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                registry.close_all();
                break;
            }
            accepted = listener.accept() => {
                let (tcp, peer_addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let conn_id = next_conn_id.fetch_add(1, Ordering::Relaxed);
                let params = ConnectionParams {
                    conn_id,
                    peer_addr,
                    tls_config: tls_config.clone(),
                    shared_secret: shared_secret.clone(),
                    fault,
                    registry: registry.clone(),
                    output_tx: output_tx.clone(),
                };
                tokio::spawn(connection::run(tcp, params));
            }
        }
    }
}

/// Drives the Receiver until the output channel closes or the Receiver
/// itself fails. Returns `true` if any `accept`/`tick`/`end` call returned
/// an error — a fatal condition per §7, surfaced to `ServerHandle::shutdown`
/// callers so the process can exit non-zero.
async fn run_writer(mut receiver: Box<dyn Receiver>, mut output_rx: mpsc::Receiver<ClientMessage>) -> bool {
    let mut failed = false;
    let mut tick = tokio::time::interval(TICK_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            msg = output_rx.recv() => {
                match msg {
                    Some(msg) => {
                        if let Err(e) = receiver.accept(msg).await {
                            tracing::error!(error = %e, "receiver rejected a message, stopping server");
                            failed = true;
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tick.tick() => {
                if let Err(e) = receiver.tick().await {
                    tracing::error!(error = %e, "receiver tick failed, stopping server");
                    failed = true;
                    break;
                }
            }
        }
    }
    if let Err(e) = receiver.end().await {
        tracing::error!(error = %e, "receiver end failed");
        failed = true;
    }
    failed
}
