//! HTTP single-shot client for the agent backend.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FallbackClient;
use crate::config::Config;
use crate::error::{ChatError, BACKEND_ERROR_FALLBACK_DETAIL};

/// `POST {base}/chat` client.
pub struct HttpFallback {
    client: Client,
    base_url: String,
}

impl HttpFallback {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ChatError::Http(format!("Failed to create HTTP client: {}", e)))?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        Self::new(config.api_base_url.as_str())
    }

    fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

/// Request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
}

/// Success body.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

/// Failure body. FastAPI puts either a string or a validation list here.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: Option<serde_json::Value>,
}

#[async_trait]
impl FallbackClient for HttpFallback {
    async fn chat(&self, query: &str) -> Result<String, ChatError> {
        let url = self.chat_url();
        debug!(url = %url, "Issuing single-shot chat call");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { query })
            .send()
            .await
            .map_err(|e| ChatError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.detail)
                .and_then(|detail| detail.as_str().map(str::to_string))
                .unwrap_or_else(|| BACKEND_ERROR_FALLBACK_DETAIL.to_string());

            return Err(ChatError::Backend {
                status: status.as_u16(),
                detail,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;

        Ok(body.response)
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(self.health_url())
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(serde_json::json!({ "query": "AAPL price?" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "AAPL is $150" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpFallback::new(server.uri()).unwrap();
        let answer = client.chat("AAPL price?").await.unwrap();
        assert_eq!(answer, "AAPL is $150");
    }

    #[tokio::test]
    async fn test_chat_backend_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({ "detail": "backend down" })),
            )
            .mount(&server)
            .await;

        let client = HttpFallback::new(server.uri()).unwrap();
        match client.chat("AAPL price?").await {
            Err(ChatError::Backend { status, detail }) => {
                assert_eq!(status, 500);
                assert_eq!(detail, "backend down");
            }
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_backend_without_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = HttpFallback::new(server.uri()).unwrap();
        match client.chat("q").await {
            Err(ChatError::Backend { status, detail }) => {
                assert_eq!(status, 503);
                assert_eq!(detail, BACKEND_ERROR_FALLBACK_DETAIL);
            }
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_validation_detail_is_not_a_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "detail": [{ "loc": ["body", "query"], "msg": "field required" }]
            })))
            .mount(&server)
            .await;

        let client = HttpFallback::new(server.uri()).unwrap();
        match client.chat("q").await {
            Err(ChatError::Backend { detail, .. }) => {
                assert_eq!(detail, BACKEND_ERROR_FALLBACK_DETAIL)
            }
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = HttpFallback::new(format!("http://127.0.0.1:{}", port)).unwrap();
        assert!(matches!(client.chat("q").await, Err(ChatError::Http(_))));
        assert!(!client.is_available().await);
    }

    #[tokio::test]
    async fn test_health_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "ok" })),
            )
            .mount(&server)
            .await;

        let client = HttpFallback::new(format!("{}/", server.uri())).unwrap();
        assert!(client.is_available().await);
    }
}
