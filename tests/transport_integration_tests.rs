use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use sift::core::config::{ConnectionSettings, ReconnectPolicy};
use sift::transport::{
    OutgoingEvent, SocketIoTransport, Transport, TransportError, TransportEvent,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

// ============================================================================
// Fake Socket.IO server
// ============================================================================

type ServerSocket = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

fn open_packet(ping_interval: u64, ping_timeout: u64) -> String {
    format!(
        r#"0{{"sid":"eio-1","upgrades":[],"pingInterval":{ping_interval},"pingTimeout":{ping_timeout},"maxPayload":1000000}}"#
    )
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("client never connected")
        .unwrap();
    accept_async(stream).await.unwrap()
}

async fn send(ws: &mut ServerSocket, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

/// Next text frame, or None once the client closed.
async fn recv_text(ws: &mut ServerSocket) -> Option<String> {
    loop {
        match timeout(WAIT, ws.next()).await.expect("client went quiet")? {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Engine.IO open + namespace connect, with the given heartbeat.
async fn handshake_with(ws: &mut ServerSocket, ping_interval: u64, ping_timeout: u64) {
    send(ws, &open_packet(ping_interval, ping_timeout)).await;
    assert_eq!(recv_text(ws).await.as_deref(), Some("40"));
    send(ws, r#"40{"sid":"sio-1"}"#).await;
}

async fn handshake(ws: &mut ServerSocket) {
    handshake_with(ws, 25000, 20000).await;
}

// ============================================================================
// Client helpers
// ============================================================================

fn settings(server_url: String, max_attempts: Option<u32>) -> ConnectionSettings {
    ConnectionSettings {
        server_url,
        socket_path: "socket.io".to_string(),
        connect_timeout: Duration::from_secs(2),
        reconnect: ReconnectPolicy {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(50),
            max_attempts,
        },
    }
}

struct Client {
    outgoing: mpsc::Sender<OutgoingEvent>,
    incoming: mpsc::Receiver<TransportEvent>,
    task: JoinHandle<Result<(), TransportError>>,
}

fn start(settings: ConnectionSettings) -> Client {
    let (outgoing, outgoing_rx) = mpsc::channel(8);
    let (incoming_tx, incoming) = mpsc::channel(32);
    let transport = SocketIoTransport::new(settings);
    let task = tokio::spawn(async move { transport.run(outgoing_rx, incoming_tx).await });
    Client {
        outgoing,
        incoming,
        task,
    }
}

async fn next_event(client: &mut Client) -> TransportEvent {
    timeout(WAIT, client.incoming.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport closed its event channel")
}

fn run_query(query: &str) -> OutgoingEvent {
    OutgoingEvent {
        name: "run_query".to_string(),
        payload: json!({ "query": query }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_session_round_trip() {
    let (listener, url) = bind().await;
    let mut client = start(settings(url, None));
    let mut ws = accept(&listener).await;

    handshake(&mut ws).await;
    assert_eq!(next_event(&mut client).await, TransportEvent::Connected);

    // Heartbeat
    send(&mut ws, "2").await;
    assert_eq!(recv_text(&mut ws).await.as_deref(), Some("3"));

    // Server → client event
    send(
        &mut ws,
        r#"42["stage_update",{"stage":"router","decision":"sql"}]"#,
    )
    .await;
    assert_eq!(
        next_event(&mut client).await,
        TransportEvent::Event {
            name: "stage_update".into(),
            payload: json!({"stage": "router", "decision": "sql"}),
        }
    );

    // Client → server event
    client.outgoing.send(run_query("what is 2+2")).await.unwrap();
    assert_eq!(
        recv_text(&mut ws).await.as_deref(),
        Some(r#"42["run_query",{"query":"what is 2+2"}]"#)
    );

    // Malformed frames are skipped without dropping the connection
    send(&mut ws, "42not json").await;
    send(&mut ws, r#"42["query_complete",{"timings":{"Total Time":1.5}}]"#).await;
    assert_eq!(
        next_event(&mut client).await,
        TransportEvent::Event {
            name: "query_complete".into(),
            payload: json!({"timings": {"Total Time": 1.5}}),
        }
    );

    // Closing the outgoing side disconnects cleanly
    let Client { outgoing, task, .. } = client;
    drop(outgoing);
    assert_eq!(recv_text(&mut ws).await.as_deref(), Some("41"));
    let result = timeout(WAIT, task).await.unwrap().unwrap();
    assert!(result.is_ok(), "expected clean shutdown, got {result:?}");
}

#[tokio::test]
async fn test_unreachable_server_gives_up_after_budget() {
    let (listener, url) = bind().await;
    drop(listener); // Nothing listens on this port any more

    let mut client = start(settings(url, Some(1)));

    // First attempt, then one retry
    assert_eq!(next_event(&mut client).await, TransportEvent::ConnectionFailed);
    assert_eq!(next_event(&mut client).await, TransportEvent::ConnectionFailed);

    let result = timeout(WAIT, client.task).await.unwrap().unwrap();
    assert!(matches!(result, Err(TransportError::RetriesExhausted(1))));
}

#[tokio::test]
async fn test_invalid_url_reports_failure() {
    let mut client = start(settings("localhost:5000".into(), None));
    assert_eq!(next_event(&mut client).await, TransportEvent::ConnectionFailed);
    let result = timeout(WAIT, client.task).await.unwrap().unwrap();
    assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
}

#[tokio::test]
async fn test_refused_namespace_counts_as_failure() {
    let (listener, url) = bind().await;
    let mut client = start(settings(url, Some(0)));
    let mut ws = accept(&listener).await;

    send(&mut ws, &open_packet(25000, 20000)).await;
    assert_eq!(recv_text(&mut ws).await.as_deref(), Some("40"));
    send(&mut ws, r#"44{"message":"Not authorized"}"#).await;

    assert_eq!(next_event(&mut client).await, TransportEvent::ConnectionFailed);
    let result = timeout(WAIT, client.task).await.unwrap().unwrap();
    assert!(matches!(result, Err(TransportError::RetriesExhausted(0))));
}

#[tokio::test]
async fn test_reconnects_and_delivers_queued_query() {
    let (listener, url) = bind().await;
    let mut client = start(settings(url, None));

    let mut first = accept(&listener).await;
    handshake(&mut first).await;
    assert_eq!(next_event(&mut client).await, TransportEvent::Connected);

    // Server drops the namespace
    send(&mut first, "41").await;
    assert_eq!(next_event(&mut client).await, TransportEvent::ConnectionFailed);
    drop(first);

    // Emitted while offline
    client.outgoing.send(run_query("still there?")).await.unwrap();

    let mut second = accept(&listener).await;
    handshake(&mut second).await;
    assert_eq!(next_event(&mut client).await, TransportEvent::Connected);
    assert_eq!(
        recv_text(&mut second).await.as_deref(),
        Some(r#"42["run_query",{"query":"still there?"}]"#)
    );
}

#[tokio::test]
async fn test_silent_server_trips_heartbeat() {
    let (listener, url) = bind().await;
    let mut client = start(settings(url, None));
    let mut ws = accept(&listener).await;

    handshake_with(&mut ws, 50, 50).await;
    assert_eq!(next_event(&mut client).await, TransportEvent::Connected);

    // No pings: the client must notice within pingInterval + pingTimeout
    assert_eq!(next_event(&mut client).await, TransportEvent::ConnectionFailed);

    // And it comes back when the server does
    let mut again = accept(&listener).await;
    handshake(&mut again).await;
    assert_eq!(next_event(&mut client).await, TransportEvent::Connected);
}
