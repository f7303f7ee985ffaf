//! Socket.IO client over a raw WebSocket.
//!
//! One `run()` call owns the whole connection lifetime:
//!
//! ```text
//!   ┌──► connect ──► open(0) ──► 40 ──► 40{sid} ──► Connected ──► session loop
//!   │                                                               │
//!   └──── backoff sleep ◄──── ConnectionFailed ◄──── drop / error ◄─┘
//! ```
//!
//! Events emitted while disconnected are queued and flushed after the
//! next successful handshake.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::packet::{EnginePacket, SocketPacket};
use super::{OutgoingEvent, Transport, TransportError, TransportEvent};
use crate::core::config::{ConnectionSettings, ReconnectPolicy};

/// Builds the Engine.IO websocket endpoint from an `http(s)://` base URL.
pub fn endpoint_url(base: &str, path: &str) -> Result<String, TransportError> {
    let invalid = || TransportError::InvalidUrl(base.to_string());
    let (scheme, rest) = base.split_once("://").ok_or_else(invalid)?;
    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid()),
    };
    let authority = rest.trim_end_matches('/');
    if authority.is_empty() {
        return Err(invalid());
    }
    let path = path.trim_matches('/');
    Ok(format!(
        "{ws_scheme}://{authority}/{path}/?EIO=4&transport=websocket"
    ))
}

/// Exponential backoff between connection attempts.
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
    next: Duration,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let next = policy.initial_delay;
        Self {
            policy,
            attempts: 0,
            next,
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.next = self.policy.initial_delay;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before the next attempt, or `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts
            && self.attempts >= max
        {
            return None;
        }
        self.attempts += 1;
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.policy.max_delay);
        Some(delay)
    }
}

enum SessionEnd {
    /// `outgoing` closed; the client is shutting down.
    Shutdown,
    /// Server closed or went silent.
    Dropped,
}

pub struct SocketIoTransport {
    settings: ConnectionSettings,
}

impl SocketIoTransport {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }

    pub fn endpoint(&self) -> Result<String, TransportError> {
        endpoint_url(&self.settings.server_url, &self.settings.socket_path)
    }

    async fn session(
        &self,
        url: &str,
        outgoing: &mut Receiver<OutgoingEvent>,
        incoming: &Sender<TransportEvent>,
        backlog: &mut VecDeque<OutgoingEvent>,
        backoff: &mut Backoff,
    ) -> Result<SessionEnd, TransportError> {
        let connect_timeout = self.settings.connect_timeout;
        let (ws, _) = timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout(connect_timeout))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let handshake = match timeout(connect_timeout, next_packet(&mut read))
            .await
            .map_err(|_| TransportError::Timeout(connect_timeout))??
        {
            Some(EnginePacket::Open(handshake)) => handshake,
            Some(other) => {
                return Err(TransportError::Handshake(format!(
                    "expected open packet, got {other:?}"
                )));
            }
            None => return Ok(SessionEnd::Dropped),
        };
        debug!(
            "Engine.IO open: sid={}, ping_interval={}ms, ping_timeout={}ms",
            handshake.sid, handshake.ping_interval, handshake.ping_timeout
        );

        send_text(&mut write, SocketPacket::Connect(None).to_frame()).await?;
        loop {
            let packet = timeout(connect_timeout, next_packet(&mut read))
                .await
                .map_err(|_| TransportError::Timeout(connect_timeout))??;
            match packet {
                Some(EnginePacket::Ping(data)) => {
                    send_text(&mut write, EnginePacket::Pong(data).encode()).await?;
                }
                Some(EnginePacket::Message(body)) => match SocketPacket::decode(&body)? {
                    Some(SocketPacket::Connect(_)) => break,
                    Some(SocketPacket::ConnectError(data)) => {
                        return Err(TransportError::Refused(data.to_string()));
                    }
                    other => debug!("Ignoring packet before namespace connect: {:?}", other),
                },
                Some(EnginePacket::Close) | None => return Ok(SessionEnd::Dropped),
                Some(_) => {}
            }
        }

        backoff.reset();
        incoming
            .send(TransportEvent::Connected)
            .await
            .map_err(|_| TransportError::ChannelClosed)?;

        while let Some(event) = backlog.pop_front() {
            debug!("Flushing queued event '{}'", event.name);
            if let Err(e) = send_text(&mut write, event_frame(&event)).await {
                backlog.push_front(event);
                return Err(e);
            }
        }

        let heartbeat = handshake.heartbeat_deadline();
        loop {
            tokio::select! {
                packet = timeout(heartbeat, next_packet(&mut read)) => {
                    let packet = packet.map_err(|_| TransportError::HeartbeatTimeout)??;
                    match packet {
                        Some(EnginePacket::Ping(data)) => {
                            send_text(&mut write, EnginePacket::Pong(data).encode()).await?;
                        }
                        Some(EnginePacket::Message(body)) => match SocketPacket::decode(&body) {
                            Ok(Some(SocketPacket::Event { name, payload })) => {
                                debug!("Received event '{}'", name);
                                incoming
                                    .send(TransportEvent::Event { name, payload })
                                    .await
                                    .map_err(|_| TransportError::ChannelClosed)?;
                            }
                            Ok(Some(SocketPacket::Disconnect)) => {
                                info!("Server disconnected the namespace");
                                return Ok(SessionEnd::Dropped);
                            }
                            Ok(other) => debug!("Ignoring packet: {:?}", other),
                            Err(e) => warn!("Discarding malformed packet: {}", e),
                        },
                        Some(EnginePacket::Close) | None => return Ok(SessionEnd::Dropped),
                        Some(_) => {}
                    }
                }
                event = outgoing.recv() => match event {
                    Some(event) => {
                        debug!("Emitting event '{}'", event.name);
                        if let Err(e) = send_text(&mut write, event_frame(&event)).await {
                            backlog.push_back(event);
                            return Err(e);
                        }
                    }
                    None => {
                        // Best effort; the peer may already be gone.
                        let _ = send_text(&mut write, SocketPacket::Disconnect.to_frame()).await;
                        let _ = write.close().await;
                        return Ok(SessionEnd::Shutdown);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Transport for SocketIoTransport {
    fn name(&self) -> &str {
        "socket.io"
    }

    async fn run(
        &self,
        mut outgoing: Receiver<OutgoingEvent>,
        incoming: Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        let url = match self.endpoint() {
            Ok(url) => url,
            Err(e) => {
                let _ = incoming.send(TransportEvent::ConnectionFailed).await;
                return Err(e);
            }
        };
        let mut backoff = Backoff::new(self.settings.reconnect.clone());
        let mut backlog = VecDeque::new();

        loop {
            info!("Connecting to {}", url);
            match self
                .session(&url, &mut outgoing, &incoming, &mut backlog, &mut backoff)
                .await
            {
                Ok(SessionEnd::Shutdown) => {
                    info!("Transport shut down");
                    return Ok(());
                }
                Ok(SessionEnd::Dropped) => warn!("Connection to {} dropped", url),
                Err(TransportError::ChannelClosed) => return Err(TransportError::ChannelClosed),
                Err(e) => warn!("Connection to {} failed: {}", url, e),
            }

            incoming
                .send(TransportEvent::ConnectionFailed)
                .await
                .map_err(|_| TransportError::ChannelClosed)?;

            let Some(delay) = backoff.next_delay() else {
                return Err(TransportError::RetriesExhausted(backoff.attempts()));
            };
            debug!("Reconnecting in {:?} (attempt {})", delay, backoff.attempts());
            tokio::time::sleep(delay).await;
        }
    }
}

fn event_frame(event: &OutgoingEvent) -> String {
    SocketPacket::Event {
        name: event.name.clone(),
        payload: event.payload.clone(),
    }
    .to_frame()
}

/// Next Engine.IO packet, or `None` when the socket closed. Undecodable
/// frames are logged and skipped.
async fn next_packet<S>(read: &mut S) -> Result<Option<EnginePacket>, TransportError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match EnginePacket::decode(&text) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => warn!("Discarding malformed frame: {}", e),
            },
            Ok(Message::Close(_)) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(TransportError::WebSocket(e.to_string())),
        }
    }
    Ok(None)
}

async fn send_text<W>(write: &mut W, text: String) -> Result<(), TransportError>
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| TransportError::WebSocket(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_maps_http_to_ws() {
        assert_eq!(
            endpoint_url("http://127.0.0.1:5000", "socket.io").unwrap(),
            "ws://127.0.0.1:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint_url("https://agent.example.com/", "/sio/").unwrap(),
            "wss://agent.example.com/sio/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        assert_eq!(
            endpoint_url("http://host:8080/app", "socket.io").unwrap(),
            "ws://host:8080/app/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn endpoint_rejects_bad_urls() {
        assert!(matches!(
            endpoint_url("127.0.0.1:5000", "socket.io"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(endpoint_url("ftp://host", "socket.io").is_err());
        assert!(endpoint_url("http://", "socket.io").is_err());
    }

    fn policy(max_attempts: Option<u32>) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            max_attempts,
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new(policy(None));
        let delays: Vec<_> = (0..5).filter_map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            [100, 200, 350, 350, 350].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn backoff_respects_attempt_budget_and_resets() {
        let mut backoff = Backoff::new(policy(Some(2)));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }
}
