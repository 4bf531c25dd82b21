use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use fwd_server::receivers::{MessageWriter, SplittingFileWriter};
use fwd_server::{FaultConfig, Receiver, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fwd-cli")]
#[command(about = "A test/fake upstream for the Fluentd Forward Protocol")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode and render Fluent Bit chunk files / Forward Protocol message files as JSON.
    Dump(DumpArgs),
    /// Run a Forward Protocol test server.
    Server(ServerArgs),
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Files or directories (walked recursively) to dump.
    paths: Vec<PathBuf>,
    /// Emit compact JSON instead of the default two-space-indented form.
    #[arg(long)]
    no_indented: bool,
    /// Log and continue on a per-file failure instead of aborting the walk.
    #[arg(long)]
    ignore_error: bool,
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Address to listen on, e.g. "localhost:24224" or ":0" for an ephemeral port.
    #[arg(long, default_value = "localhost:24224")]
    listen: String,
    /// Shared secret clients must present in the handshake.
    #[arg(long, default_value = "guess")]
    shared_secret: String,
    /// Skip the HELO/PING/PONG handshake; the stream begins immediately with Messages.
    #[arg(long)]
    no_auth: bool,
    /// Disable the embedded TLS certificate and accept plaintext connections.
    #[arg(long)]
    no_tls: bool,
    /// Probability (0.0-1.0) the server accepts then never completes the handshake.
    #[arg(long, default_value_t = 0.0)]
    random_no_handshake: f64,
    /// Probability the handshake is rejected regardless of the shared secret.
    #[arg(long, default_value_t = 0.0)]
    random_fail_auth: f64,
    /// Probability an inbound batch is silently discarded instead of processed.
    #[arg(long, default_value_t = 0.0)]
    random_no_receiving: f64,
    /// Probability the connection is dropped immediately after decoding a batch.
    #[arg(long, default_value_t = 0.0)]
    random_kill_conn: f64,
    /// Probability acks stop being sent for the remainder of a connection.
    #[arg(long, default_value_t = 0.0)]
    random_no_response: f64,
    /// Write decoded events to this file as one JSON array per message,
    /// instead of stdout.
    #[arg(long)]
    output_file: Option<PathBuf>,
    /// Pretty-print the JSON written by the default MessageWriter receiver.
    #[arg(long)]
    indented: bool,
    /// Split output into one file per tag/key combination, using "{}" as
    /// the substitution point for the computed title.
    #[arg(long)]
    split_path_format: Option<String>,
    /// Record-path keys (dot-free, "/"-separated) used to build the split title.
    #[arg(long)]
    split_key: Vec<String>,
    /// Log (rather than silently ignore) a connection that changes tag/key
    /// mid-stream when splitting.
    #[arg(long)]
    split_strict: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Dump(args) => run_dump(args),
        Command::Server(args) => run_server(args).await,
    }
}

fn run_dump(args: DumpArgs) -> ExitCode {
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    match fwd_dump::dump_paths(&args.paths, !args.no_indented, args.ignore_error, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "dump failed");
            ExitCode::FAILURE
        }
    }
}

fn build_receiver(args: &ServerArgs) -> Result<Box<dyn Receiver>, fwd_server::receivers::SplitterError> {
    if let Some(path_format) = &args.split_path_format {
        let writer = SplittingFileWriter::new(
            args.split_key.clone(),
            path_format.clone(),
            args.split_strict,
        )?;
        return Ok(Box::new(writer));
    }
    let receiver: Box<dyn Receiver> = match &args.output_file {
        Some(path) => {
            let file = File::create(path).expect("failed to create output file");
            if args.indented {
                Box::new(MessageWriter::indented(file))
            } else {
                Box::new(MessageWriter::new(file))
            }
        }
        None => {
            if args.indented {
                Box::new(MessageWriter::indented(std::io::stdout()))
            } else {
                Box::new(MessageWriter::new(std::io::stdout()))
            }
        }
    };
    Ok(receiver)
}

async fn run_server(args: ServerArgs) -> ExitCode {
    let receiver = match build_receiver(&args) {
        Ok(receiver) => receiver,
        Err(e) => {
            tracing::error!(error = %e, "invalid splitting writer configuration");
            return ExitCode::FAILURE;
        }
    };

    let config = ServerConfig {
        listen_addr: args.listen.clone(),
        shared_secret: if args.no_auth {
            None
        } else {
            Some(args.shared_secret.clone())
        },
        tls: !args.no_tls,
        fault: FaultConfig {
            random_no_handshake: args.random_no_handshake,
            random_fail_auth: args.random_fail_auth,
            random_no_receiving: args.random_no_receiving,
            random_kill_conn: args.random_kill_conn,
            random_no_response: args.random_no_response,
        },
    };

    fwd_server::rng::seed_from_entropy();

    let handle = match fwd_server::launch_server(config, receiver).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %handle.local_addr(), "fwd-cli server listening");

    shutdown_signal().await;
    info!("shutting down");
    if handle.shutdown().await {
        tracing::error!("server stopped because the receiver failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C"); },
        _ = terminate => { info!("received SIGTERM"); },
    }
}
