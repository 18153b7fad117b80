//! Socket transports for the connection manager.
//!
//! A [`Transport`] opens one connection at a time and reports everything
//! that happens on it as [`TransportEvent`]s over a channel. The UI thread
//! drains that channel and feeds the events to the
//! [`ConnectionManager`](super::ConnectionManager), so transport I/O never
//! touches connection state directly.
//!
//! [`WsTransport`] is the production implementation: each connection runs as
//! a task on a tokio runtime, splitting the WebSocket into a sink fed from an
//! outbound queue and a stream forwarded to the event channel.

use std::sync::mpsc::Sender;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

/// Generation number identifying one connection attempt.
pub type ConnectionId = u64;

/// What happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The socket is open and ready for writes.
    Opened,
    /// A text payload arrived.
    Message(String),
    /// A socket-level failure; may or may not be followed by `Closed`.
    Error(String),
    /// The socket is gone.
    Closed,
}

/// A transport event tagged with the connection it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub connection: ConnectionId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(connection: ConnectionId, kind: TransportEventKind) -> Self {
        Self { connection, kind }
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint cannot be used by this transport.
    #[error("Unsupported endpoint {0}: expected a ws:// or wss:// URL")]
    UnsupportedEndpoint(String),

    /// No connection is open.
    #[error("No open connection")]
    NotOpen,

    /// The connection task has already exited.
    #[error("Connection {0} is no longer running")]
    WorkerGone(ConnectionId),
}

/// A socket that the connection manager can drive.
///
/// Implementations report progress asynchronously as [`TransportEvent`]s
/// tagged with the `connection` id passed to [`Transport::open`].
pub trait Transport {
    /// Begin opening a connection, replacing any previous one.
    fn open(&mut self, endpoint: &Url, connection: ConnectionId) -> Result<(), TransportError>;

    /// Queue a text payload on the open connection.
    fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Drop the current connection without reporting further events.
    fn close(&mut self);
}

/// Handle to a running connection task.
struct ActiveConnection {
    id: ConnectionId,
    outbound: UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// WebSocket transport running on a tokio runtime.
pub struct WsTransport {
    runtime: tokio::runtime::Handle,
    events: Sender<TransportEvent>,
    active: Option<ActiveConnection>,
}

impl WsTransport {
    /// Create a transport that spawns connection tasks on `runtime` and
    /// reports events to `events`.
    pub fn new(runtime: tokio::runtime::Handle, events: Sender<TransportEvent>) -> Self {
        Self {
            runtime,
            events,
            active: None,
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self, endpoint: &Url, connection: ConnectionId) -> Result<(), TransportError> {
        self.close();

        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(TransportError::UnsupportedEndpoint(endpoint.to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(run_connection(
            endpoint.to_string(),
            connection,
            outbound_rx,
            self.events.clone(),
        ));

        self.active = Some(ActiveConnection {
            id: connection,
            outbound: outbound_tx,
            task,
        });
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        let active = self.active.as_ref().ok_or(TransportError::NotOpen)?;
        active
            .outbound
            .send(text)
            .map_err(|_| TransportError::WorkerGone(active.id))
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("Aborting connection task {}", active.id);
            active.task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drive one WebSocket connection until either side goes away.
///
/// Always ends with a `Closed` event unless the task is aborted.
async fn run_connection(
    endpoint: String,
    connection: ConnectionId,
    mut outbound: UnboundedReceiver<String>,
    events: Sender<TransportEvent>,
) {
    // The receiver only disappears when the app is shutting down
    let emit = |kind: TransportEventKind| {
        let _ = events.send(TransportEvent::new(connection, kind));
    };

    let stream = match connect_async(endpoint.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!("Connection {} to {} failed: {}", connection, endpoint, e);
            emit(TransportEventKind::Error(e.to_string()));
            emit(TransportEventKind::Closed);
            return;
        }
    };

    info!("Connection {} open to {}", connection, endpoint);
    emit(TransportEventKind::Opened);

    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound.recv() => {
                let Some(text) = outgoing else {
                    break;
                };
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    warn!("Connection {} write failed: {}", connection, e);
                    emit(TransportEventKind::Error(e.to_string()));
                    break;
                }
            }
            incoming = source.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => emit(TransportEventKind::Message(text)),
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => emit(TransportEventKind::Message(text)),
                    Err(_) => debug!("Connection {}: dropping non-UTF-8 binary frame", connection),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("Connection {} close frame: {:?}", connection, frame);
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Connection {} read failed: {}", connection, e);
                    emit(TransportEventKind::Error(e.to_string()));
                    break;
                }
                None => break,
            },
        }
    }

    let _ = sink.close().await;
    info!("Connection {} closed", connection);
    emit(TransportEventKind::Closed);
}
