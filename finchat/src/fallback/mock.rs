//! Mock fallback client for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::FallbackClient;
use crate::error::ChatError;

/// Mock single-shot client.
///
/// Answers every query with a fixed response, or fails with a fixed
/// backend error.
pub struct MockFallback {
    available: AtomicBool,
    response: Result<String, (u16, String)>,
    call_count: AtomicU32,
    queries: Mutex<Vec<String>>,
}

impl MockFallback {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            response: Ok("Mock response".to_string()),
            call_count: AtomicU32::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Set the response content.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.response = Ok(content.into());
        self
    }

    /// Fail every call with the given status and detail.
    pub fn with_failure(mut self, status: u16, detail: impl Into<String>) -> Self {
        self.response = Err((status, detail.into()));
        self
    }

    /// Set availability. An unavailable mock fails calls with `Http`.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Get the number of times chat was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Queries received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }
}

impl Default for MockFallback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackClient for MockFallback {
    async fn chat(&self, query: &str) -> Result<String, ChatError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(ChatError::Http("Mock backend disabled".to_string()));
        }

        match &self.response {
            Ok(content) => Ok(content.clone()),
            Err((status, detail)) => Err(ChatError::Backend {
                status: *status,
                detail: detail.clone(),
            }),
        }
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
