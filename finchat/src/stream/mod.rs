//! Streaming Session Protocol Client
//!
//! The persistent-connection path to the agent backend.
//!
//! # Architecture
//!
//! Each submodule has a single responsibility:
//!
//! | Module       | Responsibility                                        |
//! |--------------|-------------------------------------------------------|
//! | `protocol`   | JSON frame encoding, inbound frame classification     |
//! | `transport`  | WebSocket connect/send/disconnect, event delivery     |
//! | `session`    | State of one submitted query                          |
//! | `controller` | Query orchestration, progress accumulation, fallback  |
//! | `mock`       | Scriptable transport for tests                        |
//!
//! # Key Design Principles
//!
//! ## 1. One Owner Per Resource
//!
//! - The socket belongs to the connection task spawned by `WsTransport`
//! - The connection handle belongs to `WsTransport`
//! - Session state belongs to `SessionController`
//!
//! ## 2. Channels, Not Callbacks
//!
//! - The transport reports through an `mpsc` channel of `TransportEvent`
//! - The controller is that channel's single consumer
//! - The UI reads `ChatUpdate`s from the controller's own channel
//!
//! ## 3. Failures Become Messages
//!
//! Every failure path ends the current session with a chat message. Callers
//! only see `Result`s from `ChatTransport::send` and `FallbackClient::chat`.
//!
//! # Usage
//!
//! ```ignore
//! use finchat::fallback::HttpFallback;
//! use finchat::stream::{SessionController, WsTransport};
//!
//! let transport = WsTransport::new("ws://localhost:8000/ws/chat");
//! let fallback = HttpFallback::new("http://localhost:8000")?;
//! let (mut controller, mut updates) = SessionController::new(transport, fallback);
//!
//! controller.connect().await;
//! controller.submit("What is AAPL trading at?").await;
//! let outcome = controller.run_until_settled().await;
//! ```

mod protocol;
mod transport;

pub mod controller;
pub mod mock;
pub mod session;

pub use controller::{SessionController, SessionOutcome, UpdateReceiver};
pub use mock::MockTransport;
pub use protocol::{decode_binary_frame, decode_frame, encode_query, ProtocolEvent, ServerFrame};
pub use session::{Session, SessionPhase};
pub use transport::{
    ChatTransport, ConnectionState, EventReceiver, EventSender, TransportEvent, WsTransport,
};
