//! HTTP probe client.
//!
//! [`ProbeTransport`] is the seam between the runner and the network: the
//! runner only ever sees a [`RawResponse`] or a [`TransportError`]. The
//! production implementation, [`HttpProbeClient`], wraps `reqwest` and makes
//! exactly one attempt per call. Non-2xx statuses are ordinary responses
//! here; judging them is the grader's job.

use crate::body::ResponseBody;
use crate::config::{ConfigError, HarnessConfig};
use crate::models::Method;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure to obtain any response from the service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request exceeded the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// DNS resolution or TCP/TLS connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other protocol-level failure.
    #[error("request failed: {0}")]
    Request(String),
}

/// A response as observed on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body text exactly as received.
    pub raw_body: String,
    /// Parsed body, present only when `raw_body` is valid JSON.
    pub body: Option<ResponseBody>,
}

impl RawResponse {
    /// Creates a response, parsing the body as JSON when possible.
    pub fn new(status: u16, raw_body: impl Into<String>) -> Self {
        let raw_body = raw_body.into();
        let body = ResponseBody::parse(&raw_body);
        Self {
            status,
            raw_body,
            body,
        }
    }

    /// Creates a response carrying a JSON body.
    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            raw_body: value.to_string(),
            body: Some(ResponseBody::from_value(value)),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns a copy of the parsed body for inclusion in results.
    pub fn body_value(&self) -> Option<Value> {
        self.body.as_ref().map(|b| b.as_value().clone())
    }
}

/// Something that can send a single probe request.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Sends one request. `path` is appended to the configured base address;
    /// `body`, when present, is sent as JSON.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport against a configured base address.
#[derive(Debug, Clone)]
pub struct HttpProbeClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpProbeClient {
    /// Creates a client from validated configuration.
    pub fn new(config: &HarnessConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base address and a probe path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn classify(&self, method: Method, url: &str, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(format!("{} {} after {:?}", method, url, self.timeout))
        } else if err.is_connect() {
            TransportError::Connect(format!("{} {}: {}", method, url, error_chain(err)))
        } else {
            TransportError::Request(format!("{} {}: {}", method, url, error_chain(err)))
        }
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        let url = self.url(path);
        debug!(%method, %url, has_body = body.is_some(), "sending probe request");

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify(method, &url, &e))?;

        let status = response.status().as_u16();
        let raw_body = response
            .text()
            .await
            .map_err(|e| self.classify(method, &url, &e))?;

        debug!(%method, %url, status, bytes = raw_body.len(), "received probe response");
        Ok(RawResponse::new(status, raw_body))
    }
}

/// Flattens an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_response_parses_json() {
        let response = RawResponse::new(200, r#"{"account_id":"A1"}"#);
        assert_eq!(
            response.body.as_ref().and_then(|b| b.str_field("account_id")),
            Some("A1")
        );
        assert_eq!(response.body_value(), Some(json!({"account_id": "A1"})));
    }

    #[test]
    fn test_raw_response_non_json_body_is_absent() {
        let response = RawResponse::new(200, "pong");
        assert!(response.body.is_none());
        assert_eq!(response.raw_body, "pong");
        assert!(response.body_value().is_none());
    }

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(RawResponse::new(201, "").is_success());
        assert!(!RawResponse::new(302, "").is_success());
        assert!(!RawResponse::new(404, "").is_success());
    }

    #[test]
    fn test_client_url_joining() {
        let config = HarnessConfig::new("http://localhost:9090/").unwrap();
        let client = HttpProbeClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9090");
        assert_eq!(client.url("/test/ping"), "http://localhost:9090/test/ping");
        assert_eq!(client.url("accounts"), "http://localhost:9090/accounts");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Timeout("GET http://x/test/ping after 5s".to_string());
        assert_eq!(
            err.to_string(),
            "request timed out: GET http://x/test/ping after 5s"
        );
    }
}
