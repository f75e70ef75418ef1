// HTTP Transport Port
// One outbound POST. Signing and outcome classification stay in core.

use async_trait::async_trait;
use thiserror::Error;

/// Fully prepared outbound request (headers already signed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl OutboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response. The body read is best effort and may fail independently
/// of the status line.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Result<String, TransportError>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Ok(body.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("request error: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request cancelled")]
    Cancelled,
}

/// Outbound HTTP client
///
/// Implementations:
/// - ReqwestTransport (infra-http): shared reqwest client with request timeout
/// - MockHttpTransport (mocks): scripted responses for tests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue one POST and return the status and body
    ///
    /// # Errors
    /// - TransportError::InvalidRequest if the request cannot be built (bad URL, header)
    /// - TransportError::Connect / Timeout / Request for network-level failures
    async fn post(&self, request: OutboundRequest) -> Result<HttpResponse, TransportError>;
}
