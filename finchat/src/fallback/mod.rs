//! Single-shot fallback.
//!
//! When the persistent connection is unavailable, a query is answered by
//! one request/response call instead:
//! - `HttpFallback`: `POST /chat` against the agent backend
//! - `MockFallback`: configurable double for tests

pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::error::ChatError;

pub use http::HttpFallback;
pub use mock::MockFallback;

/// A non-streaming request/response path to the agent.
#[async_trait]
pub trait FallbackClient: Send + Sync {
    /// Submit a query and wait for the complete answer.
    ///
    /// # Errors
    /// - `Http` if no response arrived
    /// - `Backend` for a non-success status, carrying the server's detail
    /// - `Parse` if a success response had an unexpected body
    async fn chat(&self, query: &str) -> Result<String, ChatError>;

    /// Check if the backend is currently reachable and healthy.
    async fn is_available(&self) -> bool;
}
