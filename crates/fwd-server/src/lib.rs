pub mod acker;
pub mod config;
pub mod connection;
pub mod framing;
pub mod handshake;
pub mod receiver;
pub mod receivers;
pub mod registry;
pub mod rng;
pub mod server;
pub mod stream;
pub mod tls;

pub use config::{FaultConfig, ServerConfig};
pub use receiver::{ClientMessage, Receiver, ReceiverError};
pub use server::{launch_server, ServerHandle};
