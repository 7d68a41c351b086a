//! Finchat - streaming chat client for a remote finance agent
//!
//! Submits natural-language queries to an agent backend and turns its
//! event stream into display-ready chat updates:
//! - Persistent WebSocket session with progress accumulation
//! - Single-shot HTTP fallback when streaming is unavailable
//! - Ordered conversation model for a UI to mirror
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           SessionController             │
//! │   (one query at a time, Conversation)   │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ WsTransport │       │ HttpFallback│
//! │ (streaming) │       │ (POST /chat)│
//! └─────────────┘       └─────────────┘
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod fallback;
pub mod stream;

pub use config::Config;
pub use conversation::{ChatMessage, ChatUpdate, Conversation, MessageId, MessageKind, Sender};
pub use error::ChatError;
pub use fallback::{FallbackClient, HttpFallback, MockFallback};
pub use stream::{
    ChatTransport, ConnectionState, MockTransport, ProtocolEvent, SessionController,
    SessionOutcome, TransportEvent, WsTransport,
};
