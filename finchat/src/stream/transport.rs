//! WebSocket Transport Layer
//!
//! Single responsibility: Own the persistent connection to the agent backend,
//! send queries over it, and turn inbound frames into `TransportEvent`s.
//! No knowledge of sessions, transcripts, or fallback.
//!
//! # Ownership
//!
//! Each live connection is one spawned task that exclusively owns the
//! WebSocket stream. The adapter keeps:
//! - a command channel into that task (`Outbound`)
//! - a `watch` receiver for the task's `ConnectionState`
//! - the task's `JoinHandle`
//!
//! At most one such connection exists per adapter. `connect()` tears down the
//! previous one before opening the next.
//!
//! # Retirement
//!
//! Every connection reports through its own `Emitter`. Teardown retires the
//! emitter before anything else, so a replaced connection stays silent even
//! if its handshake completes or fails afterwards. Closing happens inside
//! `teardown()`, which holds the adapter exclusively; callers only ever see
//! `Connecting`, `Open` or `Disconnected`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use super::protocol::{decode_binary_frame, decode_frame, encode_query, ProtocolEvent};
use crate::error::ChatError;

/// Sending half of the event channel handed to `connect()`.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of the event channel. Single consumer.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Lifecycle state of the persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

/// What the transport reports to its consumer, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection finished its handshake.
    Opened,
    /// The connection ended without a local teardown.
    Closed,
    /// One classified inbound frame, or a uniform transport failure.
    Event(ProtocolEvent),
}

/// The persistent transport as the session controller uses it.
///
/// Events are delivered on the channel passed to `connect()`; exactly one
/// consumer is expected to drain it.
#[async_trait]
pub trait ChatTransport: Send {
    /// Begin establishing a connection. Any existing connection is torn
    /// down first. Does not wait for the handshake.
    async fn connect(&mut self, events: EventSender);

    /// Send a query. Fails with `NotConnected` unless the state is `Open`.
    fn send(&mut self, query: &str) -> Result<(), ChatError>;

    /// Close and forget the current connection. No-op without one.
    async fn disconnect(&mut self);

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

/// Commands from the adapter to the connection task.
#[derive(Debug)]
enum Outbound {
    Frame(String),
    Close,
}

/// Event sink for one connection. Goes quiet once retired.
#[derive(Clone)]
struct Emitter {
    events: EventSender,
    live: Arc<Mutex<bool>>,
}

impl Emitter {
    fn new(events: EventSender) -> Self {
        Self {
            events,
            live: Arc::new(Mutex::new(true)),
        }
    }

    /// Deliver an event unless retired. The flag stays locked across the
    /// send, so nothing is delivered once `retire()` has returned.
    fn emit(&self, event: TransportEvent) {
        let Ok(live) = self.live.lock() else {
            return;
        };
        if *live {
            let _ = self.events.send(event);
        }
    }

    fn retire(&self) {
        if let Ok(mut live) = self.live.lock() {
            *live = false;
        }
    }
}

/// One live connection: the task that owns the socket plus its handles.
struct Connection {
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    emitter: Emitter,
    task: JoinHandle<()>,
}

impl Connection {
    fn open(url: String, events: EventSender) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let emitter = Emitter::new(events);

        let task_emitter = emitter.clone();
        let task = tokio::spawn(async move {
            connection_loop(url, state_tx, outbound_rx, task_emitter).await;
        });

        Self {
            state: state_rx,
            outbound: outbound_tx,
            emitter,
            task,
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.emitter.retire();
        self.task.abort();
    }
}

/// WebSocket implementation of `ChatTransport`.
pub struct WsTransport {
    url: String,
    close_grace: Duration,
    connection: Option<Connection>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            close_grace: Duration::from_millis(500),
            connection: None,
        }
    }

    /// Set how long a teardown waits for the close handshake.
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn teardown(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        debug!(url = %self.url, "Closing WebSocket connection");
        connection.emitter.retire();
        let _ = connection.outbound.send(Outbound::Close);

        if tokio::time::timeout(self.close_grace, &mut connection.task)
            .await
            .is_err()
        {
            warn!(url = %self.url, "Close handshake timed out, aborting connection task");
        }
        // Drop aborts the task if it is still running.
    }
}

#[async_trait]
impl ChatTransport for WsTransport {
    async fn connect(&mut self, events: EventSender) {
        self.teardown().await;

        info!(url = %self.url, "Connecting to agent");
        self.connection = Some(Connection::open(self.url.clone(), events));
    }

    fn send(&mut self, query: &str) -> Result<(), ChatError> {
        let connection = self
            .connection
            .as_ref()
            .filter(|c| c.state() == ConnectionState::Open)
            .ok_or(ChatError::NotConnected)?;

        let frame = encode_query(query)?;
        connection
            .outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| ChatError::Transport("Connection task has exited".into()))
    }

    async fn disconnect(&mut self) {
        self.teardown().await;
    }

    fn state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map(Connection::state)
            .unwrap_or(ConnectionState::Disconnected)
    }
}

/// Connection task: connect, then pump frames both ways until either side
/// closes.
///
/// A local `Close` command ends the task quietly, even mid-handshake. Every
/// other ending emits `Closed`, preceded by a transport-failure event if it
/// was abrupt.
async fn connection_loop(
    url: String,
    state: watch::Sender<ConnectionState>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: Emitter,
) {
    // Frames are only queued once Open, so any command here is a close.
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = outbound.recv() => {
            state.send_replace(ConnectionState::Disconnected);
            debug!(url = %url, "Connect abandoned by teardown");
            return;
        }
    };

    let ws = match connected {
        Ok((ws, _)) => ws,
        Err(e) => {
            error!(url = %url, error = %e, "WebSocket connect failed");
            state.send_replace(ConnectionState::Disconnected);
            events.emit(TransportEvent::Event(ProtocolEvent::transport_failure()));
            events.emit(TransportEvent::Closed);
            return;
        }
    };

    state.send_replace(ConnectionState::Open);
    info!(url = %url, "WebSocket connection established");
    events.emit(TransportEvent::Opened);

    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(Message::Text(frame)).await {
                        error!(error = %e, "Failed to send frame");
                        events.emit(TransportEvent::Event(ProtocolEvent::transport_failure()));
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "Close handshake failed");
                    }
                    state.send_replace(ConnectionState::Disconnected);
                    debug!(url = %url, "WebSocket closed locally");
                    return;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = decode_frame(&text) {
                        events.emit(TransportEvent::Event(event));
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    if let Some(event) = decode_binary_frame(&data) {
                        events.emit(TransportEvent::Event(event));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Server closed connection");
                    break;
                }
                Some(Ok(_)) => {
                    // Ping/pong handled by tungstenite
                }
                Some(Err(e)) => {
                    error!(error = %e, "WebSocket error");
                    events.emit(TransportEvent::Event(ProtocolEvent::transport_failure()));
                    break;
                }
                None => {
                    warn!(url = %url, "WebSocket stream ended without close frame");
                    events.emit(TransportEvent::Event(ProtocolEvent::transport_failure()));
                    break;
                }
            }
        }
    }

    state.send_replace(ConnectionState::Disconnected);
    info!(url = %url, "WebSocket connection closed");
    events.emit(TransportEvent::Closed);
}
