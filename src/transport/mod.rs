//! # Transport
//!
//! Keeps a Socket.IO connection to the agent server alive and shuttles
//! named events across it. Knows nothing about queries, stages, or the
//! transcript; payloads stay untyped JSON until `core::event` decodes them.
//!
//! ```text
//!   TUI ── OutgoingEvent ──► Transport ── frames ──► server
//!   TUI ◄── TransportEvent ── Transport ◄── frames ── server
//! ```
//!
//! Lifecycle signals (`Connected`, `ConnectionFailed`) travel on the same
//! channel as server events so ordering between them is preserved.

pub mod packet;
pub mod socketio;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::{Receiver, Sender};

pub use packet::PacketError;
pub use socketio::SocketIoTransport;

/// A named event the client emits.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEvent {
    pub name: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake finished; the server accepted us on the default namespace.
    Connected,
    /// An attempt failed or an established connection dropped.
    ConnectionFailed,
    /// A named event from the server, payload undecoded.
    Event { name: String, payload: Value },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid server URL '{0}'")]
    InvalidUrl(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("server refused the connection: {0}")]
    Refused(String),
    #[error("no heartbeat from server")]
    HeartbeatTimeout,
    #[error("protocol error: {0}")]
    Protocol(#[from] PacketError),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("gave up after {0} reconnection attempts")]
    RetriesExhausted(u32),
    #[error("event channel closed")]
    ChannelClosed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the name of the transport.
    fn name(&self) -> &str;

    /// Runs until `outgoing` is closed (clean shutdown), `incoming` is
    /// dropped, or reconnection gives up.
    async fn run(
        &self,
        outgoing: Receiver<OutgoingEvent>,
        incoming: Sender<TransportEvent>,
    ) -> Result<(), TransportError>;
}
