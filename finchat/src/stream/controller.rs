//! Session Controller
//!
//! Single responsibility: Drive one query at a time end to end: pick the
//! transport, accumulate progress, declare completion, fall back when the
//! persistent connection is unusable.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  SessionController                      │
//! │  - submit() a query                                     │
//! │  - handle_event() for each TransportEvent               │
//! │  - maintains the Conversation, emits ChatUpdates        │
//! └────────────────────────────────────────────────────────┘
//!          │ ChatTransport                 │ FallbackClient
//!          ▼                               ▼
//!     WsTransport (events via mpsc)   HttpFallback (POST /chat)
//! ```
//!
//! # Delivery Contract
//!
//! The controller owns both ends of the transport event channel and is its
//! only consumer. Events are handled one at a time, in the order the
//! transport produced them, through `&mut self`; nothing else mutates
//! session state.
//!
//! # Resubmission
//!
//! Submitting while a session is still streaming abandons it in place: its
//! accumulated state is dropped, nothing is cancelled on the wire, and any
//! frames still arriving for it are attributed to the new session.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::protocol::ProtocolEvent;
use super::session::{Session, SessionPhase};
use super::transport::{ChatTransport, EventReceiver, EventSender, TransportEvent};
use crate::conversation::{ChatUpdate, Conversation, MessageKind, Sender};
use crate::error::{FALLBACK_ERROR_TEXT, STREAM_ERROR_TEXT};
use crate::fallback::FallbackClient;

/// Receiving half of the UI update feed.
pub type UpdateReceiver = mpsc::UnboundedReceiver<ChatUpdate>;

/// How `run_until_settled` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No session was in flight
    Idle,
    Answered,
    Failed,
    /// The connection closed cleanly while the session was still streaming
    Abandoned,
}

pub struct SessionController<T, F> {
    transport: T,
    fallback: F,
    events_tx: EventSender,
    events_rx: EventReceiver,
    updates: mpsc::UnboundedSender<ChatUpdate>,
    conversation: Conversation,
    session: Option<Session>,
    busy: bool,
}

impl<T, F> SessionController<T, F>
where
    T: ChatTransport,
    F: FallbackClient,
{
    /// Create a controller and the update feed its UI should drain.
    pub fn new(transport: T, fallback: F) -> (Self, UpdateReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let controller = Self {
            transport,
            fallback,
            events_tx,
            events_rx,
            updates: updates_tx,
            conversation: Conversation::new(),
            session: None,
            busy: false,
        };
        (controller, updates_rx)
    }

    /// Open (or reopen) the persistent connection. Does not wait for it.
    ///
    /// Events the outgoing connection already queued are applied first, so
    /// nothing it reported can be handled after its replacement exists.
    pub async fn connect(&mut self) {
        self.drain_events();
        self.transport.connect(self.events_tx.clone()).await;
    }

    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Submit a query.
    ///
    /// Blank queries are ignored and return false. Otherwise the query is
    /// sent over the persistent connection if it is open, or answered by the
    /// single-shot call, which this method awaits.
    pub async fn submit(&mut self, query: &str) -> bool {
        if query.trim().is_empty() {
            return false;
        }

        if let Some(previous) = self.session.as_ref().filter(|s| !s.is_terminal()) {
            warn!(
                session_id = %previous.id(),
                phase = ?previous.phase(),
                "Abandoning in-flight session"
            );
        }

        let mut session = Session::new(query);
        info!(session_id = %session.id(), "Submitting query");

        let message = self.conversation.push(Sender::User, MessageKind::Query, query);
        self.emit(ChatUpdate::Added(message));
        self.set_busy(true);

        if self.transport.is_connected() {
            match self.transport.send(query) {
                Ok(()) => {
                    debug!(session_id = %session.id(), "Query sent, streaming");
                    session.begin_streaming();
                    self.session = Some(session);
                    return true;
                }
                Err(e) => {
                    warn!(
                        session_id = %session.id(),
                        error = %e,
                        "Streaming send failed, falling back to single-shot call"
                    );
                }
            }
        } else {
            debug!(session_id = %session.id(), "Not connected, using single-shot call");
        }

        session.begin_fallback();
        self.session = Some(session);
        self.run_fallback(query).await;
        true
    }

    /// Apply one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                info!("Agent connection open");
                self.emit(ChatUpdate::Connected);
            }
            TransportEvent::Closed => {
                info!("Agent connection closed");
                self.emit(ChatUpdate::Disconnected);
            }
            TransportEvent::Event(ProtocolEvent::Progress { content }) => {
                self.on_progress(content)
            }
            TransportEvent::Event(ProtocolEvent::FinalAnswer { content }) => {
                self.on_final_answer(content)
            }
            TransportEvent::Event(ProtocolEvent::Error { content }) => {
                self.on_stream_error(content)
            }
        }
    }

    /// Wait for the next transport event and apply it.
    pub async fn pump(&mut self) -> Option<TransportEvent> {
        let event = self.events_rx.recv().await?;
        self.handle_event(event.clone());
        Some(event)
    }

    /// Apply every transport event already queued, without waiting.
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Apply events until the current session reaches a terminal state.
    ///
    /// There is no timeout: a backend that never answers stalls here.
    pub async fn run_until_settled(&mut self) -> SessionOutcome {
        loop {
            match self.session.as_ref().map(Session::phase) {
                None => return SessionOutcome::Idle,
                Some(SessionPhase::Answered) => return SessionOutcome::Answered,
                Some(SessionPhase::Failed) => return SessionOutcome::Failed,
                Some(_) => {}
            }

            match self.pump().await {
                Some(TransportEvent::Closed) if !self.session_is_terminal() => {
                    return SessionOutcome::Abandoned;
                }
                Some(_) => {}
                None => return SessionOutcome::Abandoned,
            }
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    fn on_progress(&mut self, fragment: String) {
        let Some(session) = self.session.as_mut() else {
            debug!("Dropping progress with no session");
            return;
        };
        if session.accumulate(&fragment).is_none() {
            debug!(session_id = %session.id(), phase = ?session.phase(), "Dropping progress outside streaming");
            return;
        }
        let transcript = session.transcript().to_string();

        let _ = self.updates.send(ChatUpdate::Thinking(fragment));

        match session.progress_message() {
            None => {
                let message =
                    self.conversation
                        .push(Sender::Agent, MessageKind::Progress, transcript);
                session.set_progress_message(message.id);
                let _ = self.updates.send(ChatUpdate::Added(message));
            }
            Some(id) => {
                self.conversation.update(id, transcript.as_str());
                let _ = self.updates.send(ChatUpdate::Updated { id, text: transcript });
            }
        }
    }

    fn on_final_answer(&mut self, content: String) {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.phase() == SessionPhase::Streaming)
        else {
            debug!("Dropping final answer outside a streaming session");
            return;
        };

        info!(session_id = %session.id(), fragments = session.fragment_count(), "Final answer received");

        if let Some(id) = session.progress_message() {
            if self.conversation.remove(id).is_some() {
                let _ = self.updates.send(ChatUpdate::Removed(id));
            }
        }
        session.finish_answered();

        let message = self
            .conversation
            .push(Sender::Agent, MessageKind::Answer, content);
        self.emit(ChatUpdate::Added(message));
        self.set_busy(false);
    }

    fn on_stream_error(&mut self, content: String) {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.phase() == SessionPhase::Streaming)
        else {
            warn!(error = %content, "Agent error outside a streaming session");
            return;
        };

        error!(session_id = %session.id(), error = %content, "Streaming session failed");
        session.finish_failed();

        self.set_busy(false);
        let message = self
            .conversation
            .push(Sender::Agent, MessageKind::Error, STREAM_ERROR_TEXT);
        self.emit(ChatUpdate::Added(message));
    }

    async fn run_fallback(&mut self, query: &str) {
        let result = self.fallback.chat(query).await;
        let session_id = self.session.as_ref().map(Session::id);

        let message = match result {
            Ok(answer) => {
                info!(session_id = ?session_id, "Single-shot call answered");
                if let Some(session) = self.session.as_mut() {
                    session.finish_answered();
                }
                self.conversation
                    .push(Sender::Agent, MessageKind::Answer, answer)
            }
            Err(e) => {
                error!(session_id = ?session_id, error = %e, "Single-shot call failed");
                if let Some(session) = self.session.as_mut() {
                    session.finish_failed();
                }
                self.conversation
                    .push(Sender::Agent, MessageKind::Error, FALLBACK_ERROR_TEXT)
            }
        };

        self.emit(ChatUpdate::Added(message));
        self.set_busy(false);
    }

    fn session_is_terminal(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_terminal)
    }

    fn set_busy(&mut self, busy: bool) {
        if self.busy != busy {
            self.busy = busy;
            self.emit(ChatUpdate::Busy(busy));
        }
    }

    fn emit(&self, update: ChatUpdate) {
        // The UI may have gone away; the conversation is still authoritative.
        let _ = self.updates.send(update);
    }
}
