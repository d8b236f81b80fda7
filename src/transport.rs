//! Byte-source seam for the streaming test endpoint
//!
//! The session never talks HTTP directly: it pulls fragments from a
//! [`StreamTransport`], which keeps the read loop testable with scripted
//! sources and concentrates cancellation at one seam (dropping the returned
//! stream aborts the underlying request).

use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;

/// Fragments as they arrive from the wire
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Body sent to the test endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TestRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Byte source for one streaming exchange
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a streaming exchange with the given agent's test endpoint.
    ///
    /// Returns [`ConsoleError::Unauthorized`] when the bearer credential is
    /// rejected, before any fragment is delivered.
    async fn open(&self, agent_id: &str, message: &str) -> Result<ByteStream>;
}

/// HTTP transport against the platform's test endpoint
pub struct HttpStreamTransport {
    config: ConsoleConfig,
    client: reqwest::Client,
}

impl HttpStreamTransport {
    /// The client carries no overall timeout: test streams are long-lived
    /// and are ended by the wire protocol or by cancellation.
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn open(&self, agent_id: &str, message: &str) -> Result<ByteStream> {
        let url = self.config.test_endpoint(agent_id);
        let request = TestRequest {
            message: message.to_string(),
            tenant_id: self.config.tenant_id.clone(),
        };
        tracing::debug!(%url, "opening test stream");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_token.expose()),
            )
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| ConsoleError::Transport(format!("failed to reach test endpoint: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ConsoleError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConsoleError::Transport(format!(
                "test endpoint returned {status}: {body}"
            )));
        }

        Ok(response
            .bytes_stream()
            .map(|fragment| {
                fragment.map_err(|e| ConsoleError::Transport(format!("stream read failed: {e}")))
            })
            .boxed())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_omits_absent_tenant() {
        let request = TestRequest {
            message: "hi".to_string(),
            tenant_id: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"message":"hi"}"#);
    }

    #[test]
    fn test_request_body_includes_tenant() {
        let request = TestRequest {
            message: "hi".to_string(),
            tenant_id: Some("acme".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"message":"hi","tenant_id":"acme"}"#);
    }
}
