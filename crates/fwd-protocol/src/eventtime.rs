//! Forward Protocol `EventTime`: msgpack ext type 0, 8 bytes big-endian
//! (seconds, nanoseconds).

use crate::error::ProtocolError;

/// Msgpack ext type ID reserved by the Forward Protocol for `EventTime`.
pub const EVENT_TIME_EXT_TYPE: i8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventTime {
    pub seconds: u32,
    pub nanoseconds: u32,
}

impl EventTime {
    pub fn new(seconds: u32, nanoseconds: u32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }

    /// Seconds since the epoch as a float, nanoseconds folded into the
    /// fractional part. Used for JSON dump rendering (§4.7).
    pub fn as_unix_seconds_f64(&self) -> f64 {
        f64::from(self.seconds) + f64::from(self.nanoseconds) / 1_000_000_000.0
    }

    pub fn to_ext_bytes(self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.seconds.to_be_bytes());
        buf[4..8].copy_from_slice(&self.nanoseconds.to_be_bytes());
        buf
    }

    pub fn from_ext_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != 8 {
            return Err(ProtocolError::Framing(format!(
                "EventTime ext payload must be 8 bytes, got {}",
                bytes.len()
            )));
        }
        let seconds = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let nanoseconds = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        Ok(Self {
            seconds,
            nanoseconds,
        })
    }

    /// Decode from a generic msgpack value, expecting `Ext(0, 8 bytes)`.
    pub fn from_value(value: &rmpv::Value) -> Result<Self, ProtocolError> {
        match value {
            rmpv::Value::Ext(EVENT_TIME_EXT_TYPE, data) => Self::from_ext_bytes(data),
            rmpv::Value::Ext(other, _) => Err(ProtocolError::Framing(format!(
                "unexpected ext type {other}, expected EventTime (0)"
            ))),
            other => Err(ProtocolError::Framing(format!(
                "expected EventTime ext value, got {other:?}"
            ))),
        }
    }

    pub fn to_value(self) -> rmpv::Value {
        rmpv::Value::Ext(EVENT_TIME_EXT_TYPE, self.to_ext_bytes().to_vec())
    }
}
