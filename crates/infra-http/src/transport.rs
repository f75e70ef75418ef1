// reqwest HttpTransport Implementation

use async_trait::async_trait;
use hookline_core::error::{AppError, Result};
use hookline_core::port::{HttpResponse, HttpTransport, OutboundRequest, TransportError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect, Client, Url};
use std::error::Error as StdError;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = concat!("hookline/", env!("CARGO_PKG_VERSION"));

/// Response bytes read before the rest of the body is discarded
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Shared reqwest client for webhook deliveries and test webhooks.
///
/// Redirects are not followed: a 3xx is reported to the caller as a
/// non-2xx response. Response bodies are read up to `max_body_bytes`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    /// Build the client with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(AppError::Config("HTTP timeout must be positive".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_body_bytes: MAX_RESPONSE_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    fn headers(request: &OutboundRequest) -> std::result::Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(
        &self,
        request: OutboundRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let url = Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidRequest(format!("invalid URL {}: {}", request.url, e)))?;
        let headers = Self::headers(&request)?;

        let mut response = self
            .client
            .post(url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = read_capped(&mut response, self.max_body_bytes)
            .await
            .map_err(|e| TransportError::Body(error_chain(&e)));

        debug!(url = %request.url, status_code = status, "POST completed");
        Ok(HttpResponse { status, body })
    }
}

/// Read at most `cap` bytes of the body; the remainder is never pulled off
/// the socket. Invalid UTF-8 is replaced, and a character cut by the cap is
/// dropped.
async fn read_capped(
    response: &mut reqwest::Response,
    cap: usize,
) -> std::result::Result<String, reqwest::Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = cap - buf.len();
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            if chunk.len() > remaining {
                debug!(cap, "Response body truncated");
            }
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(decode_lossy(buf))
}

fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let utf8_error = e.utf8_error();
            let mut bytes = e.into_bytes();
            if utf8_error.error_len().is_none() {
                bytes.truncate(utf8_error.valid_up_to());
            }
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let message = error_chain(&err);
    if err.is_builder() {
        TransportError::InvalidRequest(message)
    } else if err.is_timeout() {
        TransportError::Timeout(message)
    } else if err.is_connect() {
        TransportError::Connect(message)
    } else {
        TransportError::Request(message)
    }
}

/// reqwest hides the root cause (DNS, refused, TLS) in the source chain
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(url: String) -> OutboundRequest {
        OutboundRequest {
            url,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("webhook-id".to_string(), "msg-1".to_string()),
                ("webhook-signature".to_string(), "v1,abc=".to_string()),
            ],
            body: br#"{"type":"contact.created"}"#.to_vec(),
        }
    }

    fn transport(timeout: Duration) -> ReqwestTransport {
        ReqwestTransport::new(timeout).unwrap()
    }

    #[tokio::test]
    async fn test_posts_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("webhook-id", "msg-1"))
            .and(header("webhook-signature", "v1,abc="))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", USER_AGENT))
            .and(body_string(r#"{"type":"contact.created"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(Duration::from_secs(5))
            .post(request(format!("{}/hook", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(response.body.unwrap(), "OK");
    }

    #[tokio::test]
    async fn test_non_2xx_is_a_response_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Server Error"))
            .mount(&server)
            .await;

        let response = transport(Duration::from_secs(5))
            .post(request(server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.body.unwrap(), "Server Error");
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let response = transport(Duration::from_secs(5))
            .post(request(format!("{}/old", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status, 302);
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = transport(Duration::from_millis(100))
            .post(request(server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_connection_refused_is_classified() {
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };

        let err = transport(Duration::from_secs(5))
            .post(request(uri))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_invalid_url_and_header() {
        let t = transport(Duration::from_secs(5));

        let err = t.post(request("not a url".to_string())).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));

        let mut bad = request("http://127.0.0.1:9/hook".to_string());
        bad.headers.push(("webhook-id".to_string(), "line\nbreak".to_string()));
        let err = t.post(bad).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            ReqwestTransport::new(Duration::ZERO),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_body_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 8 * 1024 * 1024]))
            .mount(&server)
            .await;

        let response = transport(Duration::from_secs(10))
            .post(request(server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        let body = response.body.unwrap();
        assert_eq!(body.len(), MAX_RESPONSE_BYTES);
    }

    #[tokio::test]
    async fn test_cap_does_not_split_characters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("ééé"))
            .mount(&server)
            .await;

        let response = transport(Duration::from_secs(5))
            .with_max_body_bytes(5)
            .post(request(server.uri()))
            .await
            .unwrap();
        assert_eq!(response.body.unwrap(), "éé");
    }

    #[test]
    fn test_decode_lossy_replaces_invalid_bytes() {
        assert_eq!(decode_lossy(b"ok".to_vec()), "ok");
        assert_eq!(decode_lossy(vec![b'a', 0xff, b'b']), "a\u{fffd}b");
    }
}
