//! Error types for finchat

use thiserror::Error;

/// Shown when a streaming session ends in an `Error` event.
pub const STREAM_ERROR_TEXT: &str =
    "Sorry, something went wrong with the connection. Please try again.";

/// Shown when the single-shot call fails for any reason.
pub const FALLBACK_ERROR_TEXT: &str = "Sorry, something went wrong. Please try again.";

/// Content of the `Error` event emitted for an undecodable inbound payload.
pub const PARSE_ERROR_TEXT: &str = "Failed to parse message from server";

/// Content of the `Error` event emitted for any transport-level failure.
pub const TRANSPORT_ERROR_TEXT: &str = "WebSocket connection error";

/// Detail used when a failed single-shot response carries none.
pub const BACKEND_ERROR_FALLBACK_DETAIL: &str = "Failed to get response from agent.";

#[derive(Error, Debug)]
pub enum ChatError {
    /// `send` was attempted while the persistent connection was not open.
    #[error("WebSocket is not connected")]
    NotConnected,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The single-shot call returned a non-success status.
    #[error("Backend error (HTTP {status}): {detail}")]
    Backend { status: u16, detail: String },

    /// The single-shot call never produced a response.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_includes_detail() {
        let err = ChatError::Backend {
            status: 500,
            detail: "backend down".to_string(),
        };
        assert_eq!(err.to_string(), "Backend error (HTTP 500): backend down");
    }
}
