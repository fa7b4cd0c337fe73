//! HTTP transport seam used by the submitter.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

use super::FailureReason;
use crate::config::SyncConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub ok: bool,
    pub status: u16,
    /// Parsed JSON body, a JSON string for non-JSON bodies, or null
    pub data: Value,
}

/// The request never produced a response
#[derive(Debug, Error)]
#[error("no response from {url}: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// Sends one request and returns the raw response.
///
/// Timeouts are the transport's business: a request that never resolves
/// must eventually come back as a [`TransportError`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Map an unsuccessful response to a failure reason
pub const fn classify_failure(response: &TransportResponse) -> FailureReason {
    match response.status {
        400..=499 => FailureReason::Rejected,
        _ => FailureReason::Unknown,
    }
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReqwestTransport")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            client,
            bearer_token: None,
        })
    }

    /// Build a transport from the sync configuration (timeout and token)
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let transport = Self::new(config.request_timeout())?;
        Ok(match config.api_token.clone() {
            Some(token) => transport.with_bearer_token(token),
            None => transport,
        })
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request.body);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|error| TransportError {
            url: request.url.clone(),
            message: error.to_string(),
        })?;

        let status = response.status();
        let data = match response.text().await {
            Ok(text) => parse_body(&text),
            Err(error) => {
                tracing::debug!("Failed to read response body from {}: {error}", request.url);
                Value::Null
            }
        };

        Ok(TransportResponse {
            ok: status.is_success(),
            status: status.as_u16(),
            data,
        })
    }
}

fn parse_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16) -> TransportResponse {
        TransportResponse {
            ok: (200..300).contains(&status),
            status,
            data: Value::Null,
        }
    }

    #[test]
    fn client_errors_are_rejections() {
        assert_eq!(classify_failure(&response(400)), FailureReason::Rejected);
        assert_eq!(classify_failure(&response(401)), FailureReason::Rejected);
        assert_eq!(classify_failure(&response(422)), FailureReason::Rejected);
        assert_eq!(classify_failure(&response(499)), FailureReason::Rejected);
    }

    #[test]
    fn other_statuses_are_unknown() {
        assert_eq!(classify_failure(&response(500)), FailureReason::Unknown);
        assert_eq!(classify_failure(&response(503)), FailureReason::Unknown);
        assert_eq!(classify_failure(&response(302)), FailureReason::Unknown);
    }

    #[test]
    fn parse_body_handles_json_text_and_empty() {
        assert_eq!(parse_body(r#"{"id": 1}"#), json!({ "id": 1 }));
        assert_eq!(parse_body("Bad Gateway"), json!("Bad Gateway"));
        assert_eq!(parse_body("  "), Value::Null);
    }

    #[test]
    fn debug_redacts_bearer_token() {
        let transport = ReqwestTransport::new(Duration::from_secs(1))
            .unwrap()
            .with_bearer_token("secret");
        let debug = format!("{transport:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let transport = ReqwestTransport::new(Duration::from_millis(500)).unwrap();
        let result = transport
            .send(TransportRequest {
                method: Method::POST,
                url: "http://127.0.0.1:9/attendance".to_string(),
                body: json!({}),
            })
            .await;
        assert!(result.is_err());
    }
}
