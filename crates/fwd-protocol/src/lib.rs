//! Wire types and codecs for the Fluentd Forward Protocol and the Fluent
//! Bit chunk file format. Pure data + (de)serialization — no networking.

pub mod chunk;
pub mod error;
pub mod eventtime;
pub mod handshake;
pub mod json;
pub mod message;

pub use chunk::{iterate_records, make_header, parse_chunk, ChunkError, IterateError, RecordError};
pub use error::ProtocolError;
pub use eventtime::EventTime;
pub use handshake::{shared_key_digest, Helo, Ping, Pong};
pub use message::{Ack, EventEntry, Message, ResolveError, TransportOption};
