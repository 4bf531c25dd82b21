//! Forward Protocol handshake records (C4): HELO / PING / PONG, all framed
//! as msgpack arrays, plus the shared-secret digest both sides compute.
//!
//! The stateful client/server exchange (I/O, timeouts, nonce generation,
//! auth callback) lives in `fwd-server`; this module only covers wire
//! representation and the pure digest function.

use sha2::{Digest, Sha512};

use crate::error::ProtocolError;

/// `["HELO", {nonce, auth, keepalive}]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Helo {
    pub nonce: String,
    pub auth: String,
    pub keepalive: bool,
}

/// `["PING", client_hostname, shared_key_salt, shared_key_hexdigest, username, password]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    pub client_hostname: String,
    pub shared_key_salt: String,
    pub shared_key_hexdigest: String,
    pub username: String,
    pub password: String,
}

/// `["PONG", auth_result, reason, server_hostname, shared_key_hexdigest]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    pub auth_result: bool,
    pub reason: String,
    pub server_hostname: String,
    pub shared_key_hexdigest: String,
}

/// `sha512(salt ‖ hostname ‖ nonce ‖ shared_key)`, lowercase hex.
pub fn shared_key_digest(salt: &str, hostname: &str, nonce: &str, shared_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(salt.as_bytes());
    hasher.update(hostname.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(shared_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn expect_tag(items: &[rmpv::Value], expected: &str) -> Result<(), ProtocolError> {
    match items.first().and_then(rmpv::Value::as_str) {
        Some(tag) if tag == expected => Ok(()),
        other => Err(ProtocolError::Framing(format!(
            "expected {expected:?} handshake message, got {other:?}"
        ))),
    }
}

impl Helo {
    pub fn to_value(&self) -> rmpv::Value {
        rmpv::Value::Array(vec![
            rmpv::Value::from("HELO"),
            rmpv::Value::Map(vec![
                (rmpv::Value::from("nonce"), rmpv::Value::from(self.nonce.clone())),
                (rmpv::Value::from("auth"), rmpv::Value::from(self.auth.clone())),
                (rmpv::Value::from("keepalive"), rmpv::Value::from(self.keepalive)),
            ]),
        ])
    }

    pub fn from_value(value: rmpv::Value) -> Result<Self, ProtocolError> {
        let items = as_array(value, "HELO")?;
        expect_tag(&items, "HELO")?;
        let opts = items
            .get(1)
            .ok_or_else(|| ProtocolError::Framing("HELO missing options map".into()))?;
        let map = opts
            .as_map()
            .ok_or_else(|| ProtocolError::Framing("HELO options must be a map".into()))?;
        let nonce = map_str(map, "nonce").unwrap_or_default();
        let auth = map_str(map, "auth").unwrap_or_default();
        let keepalive = map
            .iter()
            .find(|(k, _)| k.as_str() == Some("keepalive"))
            .and_then(|(_, v)| v.as_bool())
            .unwrap_or(false);
        Ok(Self {
            nonce,
            auth,
            keepalive,
        })
    }
}

impl Ping {
    pub fn to_value(&self) -> rmpv::Value {
        rmpv::Value::Array(vec![
            rmpv::Value::from("PING"),
            rmpv::Value::from(self.client_hostname.clone()),
            rmpv::Value::from(self.shared_key_salt.clone()),
            rmpv::Value::from(self.shared_key_hexdigest.clone()),
            rmpv::Value::from(self.username.clone()),
            rmpv::Value::from(self.password.clone()),
        ])
    }

    pub fn from_value(value: rmpv::Value) -> Result<Self, ProtocolError> {
        let items = as_array(value, "PING")?;
        expect_tag(&items, "PING")?;
        Ok(Self {
            client_hostname: str_at(&items, 1)?,
            shared_key_salt: str_at(&items, 2)?,
            shared_key_hexdigest: str_at(&items, 3)?,
            username: str_at(&items, 4).unwrap_or_default(),
            password: str_at(&items, 5).unwrap_or_default(),
        })
    }
}

impl Pong {
    pub fn to_value(&self) -> rmpv::Value {
        rmpv::Value::Array(vec![
            rmpv::Value::from("PONG"),
            rmpv::Value::from(self.auth_result),
            rmpv::Value::from(self.reason.clone()),
            rmpv::Value::from(self.server_hostname.clone()),
            rmpv::Value::from(self.shared_key_hexdigest.clone()),
        ])
    }

    pub fn from_value(value: rmpv::Value) -> Result<Self, ProtocolError> {
        let items = as_array(value, "PONG")?;
        expect_tag(&items, "PONG")?;
        let auth_result = items
            .get(1)
            .and_then(rmpv::Value::as_bool)
            .ok_or_else(|| ProtocolError::Framing("PONG auth_result must be a bool".into()))?;
        Ok(Self {
            auth_result,
            reason: str_at(&items, 2).unwrap_or_default(),
            server_hostname: str_at(&items, 3)?,
            shared_key_hexdigest: str_at(&items, 4)?,
        })
    }
}

fn as_array(value: rmpv::Value, kind: &str) -> Result<Vec<rmpv::Value>, ProtocolError> {
    match value {
        rmpv::Value::Array(items) => Ok(items),
        other => Err(ProtocolError::Framing(format!(
            "{kind} must be an array, got {other:?}"
        ))),
    }
}

fn str_at(items: &[rmpv::Value], idx: usize) -> Result<String, ProtocolError> {
    items
        .get(idx)
        .and_then(rmpv::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::Framing(format!("missing or non-string field at index {idx}")))
}

fn map_str(map: &[(rmpv::Value, rmpv::Value)], key: &str) -> Option<String> {
    map.iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .and_then(|(_, v)| v.as_str())
        .map(str::to_owned)
}
