//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Two layers, each a one-character type prefix:
//!
//! ```text
//! Engine.IO   0 open   1 close   2 ping   3 pong   4 message   5 upgrade   6 noop
//!                                                    │
//! Socket.IO   (inside "4")  0 connect  1 disconnect  2 event  3 ack  4 connect_error
//!
//! "42[\"stage_update\",{\"stage\":\"router\"}]"  = message(event("stage_update", {...}))
//! ```
//!
//! Only the default namespace and text frames are supported; binary
//! attachments are rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type '{0}'")]
    UnknownType(char),
    #[error("malformed packet: {0}")]
    Malformed(String),
    #[error("invalid JSON in packet: {0}")]
    Json(#[from] serde_json::Error),
}

/// Body of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the server may stay silent before the connection counts as dead.
    pub fn heartbeat_deadline(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<EnginePacket, PacketError> {
        let (kind, body) = split_type(text)?;
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(body) => format!("4{body}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, payload: Value },
    Ack(Value),
    ConnectError(Value),
}

impl SocketPacket {
    /// Decode the body of an Engine.IO message. Packets addressed to a
    /// namespace other than `/` decode to `Ok(None)`.
    pub fn decode(text: &str) -> Result<Option<SocketPacket>, PacketError> {
        let (kind, rest) = split_type(text)?;

        let rest = match rest.strip_prefix('/') {
            Some(nsp) => {
                let (namespace, tail) = nsp.split_once(',').unwrap_or((nsp, ""));
                if !namespace.is_empty() {
                    return Ok(None);
                }
                tail
            }
            None => rest,
        };

        // Optional ack id precedes the JSON body.
        let data = rest.trim_start_matches(|c: char| c.is_ascii_digit());

        let packet = match kind {
            '0' => SocketPacket::Connect(parse_optional(data)?),
            '1' => SocketPacket::Disconnect,
            '2' => {
                let (name, payload) = parse_event(data)?;
                SocketPacket::Event { name, payload }
            }
            '3' => SocketPacket::Ack(parse_optional(data)?.unwrap_or(Value::Null)),
            '4' => SocketPacket::ConnectError(parse_optional(data)?.unwrap_or(Value::Null)),
            '5' | '6' => {
                return Err(PacketError::Malformed(
                    "binary packets are not supported".to_string(),
                ));
            }
            other => return Err(PacketError::UnknownType(other)),
        };
        Ok(Some(packet))
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{auth}"),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, payload } => {
                format!("2{}", Value::Array(vec![Value::String(name.clone()), payload.clone()]))
            }
            SocketPacket::Ack(args) => format!("3{args}"),
            SocketPacket::ConnectError(data) => format!("4{data}"),
        }
    }

    /// Wrap in an Engine.IO message, ready for a text frame.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

fn split_type(text: &str) -> Result<(char, &str), PacketError> {
    let kind = text.chars().next().ok_or(PacketError::Empty)?;
    Ok((kind, &text[kind.len_utf8()..]))
}

fn parse_optional(data: &str) -> Result<Option<Value>, PacketError> {
    if data.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::from_str(data)?))
    }
}

fn parse_event(data: &str) -> Result<(String, Value), PacketError> {
    let Value::Array(mut items) = serde_json::from_str(data)? else {
        return Err(PacketError::Malformed("event body is not an array".to_string()));
    };
    if items.is_empty() {
        return Err(PacketError::Malformed("event has no name".to_string()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(PacketError::Malformed("event name is not a string".to_string()));
    };
    // Only the first argument is used; extra arguments are dropped.
    let payload = items.into_iter().next().unwrap_or(Value::Null);
    Ok((name, payload))
}
