//! Agent Wire Protocol
//!
//! Single responsibility: Encode outbound queries and decode inbound frames.
//!
//! # Wire Format
//!
//! ## Outbound (client → server)
//! ```text
//! { "query": <string> }
//! ```
//!
//! ## Inbound (server → client)
//! ```text
//! {
//!     "type": "thinking" | "token" | "tool_start" | "tool_end"
//!           | "agent_action" | "agent_finish" | "response" | "error",
//!     "content": <string>,
//! }
//! ```
//!
//! # Decoding Policy
//!
//! | Payload                                  | Result                        |
//! |------------------------------------------|-------------------------------|
//! | one of the six progress types            | `Some(Progress)`              |
//! | `response`                               | `Some(FinalAnswer)`           |
//! | `error`                                  | `Some(Error)`                 |
//! | well-formed object, unknown `type`       | `None` (dropped)              |
//! | not JSON, not an object, missing fields  | `Some(Error(PARSE_ERROR_TEXT))` |

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ChatError, PARSE_ERROR_TEXT, TRANSPORT_ERROR_TEXT};

/// Outbound frame.
#[derive(Debug, Serialize)]
struct QueryFrame<'a> {
    query: &'a str,
}

/// Inbound frame as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Thinking { content: String },
    Token { content: String },
    ToolStart { content: String },
    ToolEnd { content: String },
    AgentAction { content: String },
    AgentFinish { content: String },
    Response { content: String },
    Error { content: String },
    /// Any `type` this client does not know, e.g. `thinking_complete`.
    #[serde(other)]
    Unknown,
}

/// A classified inbound event, as the session controller sees it.
///
/// All progress subtypes are collapsed into `Progress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    Progress { content: String },
    FinalAnswer { content: String },
    Error { content: String },
}

impl ProtocolEvent {
    /// The event reported for an undecodable payload.
    pub fn parse_failure() -> Self {
        ProtocolEvent::Error {
            content: PARSE_ERROR_TEXT.to_string(),
        }
    }

    /// The event reported for any transport-level failure.
    pub fn transport_failure() -> Self {
        ProtocolEvent::Error {
            content: TRANSPORT_ERROR_TEXT.to_string(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ProtocolEvent::Progress { content }
            | ProtocolEvent::FinalAnswer { content }
            | ProtocolEvent::Error { content } => content,
        }
    }

    /// Whether this event ends the session it belongs to.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProtocolEvent::Progress { .. })
    }
}

impl ServerFrame {
    /// Classify the frame. `Unknown` frames map to `None`.
    pub fn into_event(self) -> Option<ProtocolEvent> {
        match self {
            ServerFrame::Thinking { content }
            | ServerFrame::Token { content }
            | ServerFrame::ToolStart { content }
            | ServerFrame::ToolEnd { content }
            | ServerFrame::AgentAction { content }
            | ServerFrame::AgentFinish { content } => Some(ProtocolEvent::Progress { content }),
            ServerFrame::Response { content } => Some(ProtocolEvent::FinalAnswer { content }),
            ServerFrame::Error { content } => Some(ProtocolEvent::Error { content }),
            ServerFrame::Unknown => None,
        }
    }
}

/// Encode a query as an outbound text frame.
pub fn encode_query(query: &str) -> Result<String, ChatError> {
    Ok(serde_json::to_string(&QueryFrame { query })?)
}

/// Parse a raw payload into a wire frame.
pub fn parse_frame(payload: &str) -> Result<ServerFrame, ChatError> {
    serde_json::from_str(payload).map_err(|e| ChatError::Parse(e.to_string()))
}

/// Decode a raw text payload into a protocol event.
///
/// Returns `None` for well-formed frames of an unknown type.
pub fn decode_frame(payload: &str) -> Option<ProtocolEvent> {
    match parse_frame(payload) {
        Ok(ServerFrame::Unknown) => {
            debug!(payload = %payload, "Ignoring frame of unknown type");
            None
        }
        Ok(frame) => frame.into_event(),
        Err(e) => {
            warn!(error = %e, "Error parsing server frame");
            Some(ProtocolEvent::parse_failure())
        }
    }
}

/// Decode a binary payload. It must be UTF-8 text carrying a normal frame.
pub fn decode_binary_frame(payload: &[u8]) -> Option<ProtocolEvent> {
    match std::str::from_utf8(payload) {
        Ok(text) => decode_frame(text),
        Err(e) => {
            warn!(error = %e, "Binary frame is not valid UTF-8");
            Some(ProtocolEvent::parse_failure())
        }
    }
}
