//! Mock transport for testing.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::protocol::ProtocolEvent;
use super::transport::{ChatTransport, ConnectionState, EventSender, TransportEvent};
use crate::error::ChatError;

/// Scriptable in-memory `ChatTransport`.
///
/// Each successful `send()` pops the next scripted reply and delivers its
/// events, in order, on the channel registered by `connect()`.
pub struct MockTransport {
    state: ConnectionState,
    open_on_connect: bool,
    send_failure: bool,
    events: Option<EventSender>,
    replies: VecDeque<Vec<ProtocolEvent>>,
    sent: Vec<String>,
    connect_count: u32,
}

impl MockTransport {
    /// A transport that opens as soon as `connect()` is called.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            open_on_connect: true,
            send_failure: false,
            events: None,
            replies: VecDeque::new(),
            sent: Vec::new(),
            connect_count: 0,
        }
    }

    /// A transport whose `connect()` never completes the handshake.
    pub fn unreachable() -> Self {
        Self {
            open_on_connect: false,
            ..Self::new()
        }
    }

    /// Queue the events answering the next sent query.
    pub fn with_reply(mut self, events: Vec<ProtocolEvent>) -> Self {
        self.replies.push_back(events);
        self
    }

    /// Report `Open` but fail every `send()`, as when the socket dropped
    /// between the status check and the send.
    pub fn with_send_failure(mut self) -> Self {
        self.send_failure = true;
        self
    }

    /// Queries sent, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count
    }

    /// Deliver an arbitrary event to the registered consumer.
    pub fn emit(&self, event: TransportEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Simulate the remote side closing the connection.
    pub fn close_remotely(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.emit(TransportEvent::Closed);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn connect(&mut self, events: EventSender) {
        self.disconnect().await;
        self.connect_count += 1;
        self.events = Some(events);

        if self.open_on_connect {
            self.state = ConnectionState::Open;
            self.emit(TransportEvent::Opened);
        } else {
            self.state = ConnectionState::Connecting;
        }
    }

    fn send(&mut self, query: &str) -> Result<(), ChatError> {
        if self.state != ConnectionState::Open {
            return Err(ChatError::NotConnected);
        }
        if self.send_failure {
            return Err(ChatError::Transport("Mock send failure".to_string()));
        }

        self.sent.push(query.to_string());
        if let Some(reply) = self.replies.pop_front() {
            for event in reply {
                self.emit(TransportEvent::Event(event));
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.events = None;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}
