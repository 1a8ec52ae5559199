//! HTTP client for forwarding events to seller endpoints.
//!
//! Sends one JSON `POST` per event and reports every downstream response,
//! successful or not. Transport failures are categorized as timeouts or
//! network errors.

use std::time::{Duration, Instant};

use courier_core::CorrelationId;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use crate::{
    error::{ForwardingError, Result},
    API_KEY_HEADER, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_SECONDS,
};

const MAX_RESPONSE_BODY_SIZE: usize = 64 * 1024;
const TRUNCATION_SUFFIX: &str = "... (truncated)";

/// Configuration for the forwarding client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for one HTTP request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum number of redirects to follow.
    pub max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            user_agent: format!("courier/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// HTTP client shared by all forwarding calls.
///
/// Wraps a pooled `reqwest::Client`; clones share the pool.
#[derive(Debug, Clone)]
pub struct ForwardingClient {
    client: reqwest::Client,
    config: ClientConfig,
}

/// One outgoing forwarding request.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    /// Fully built destination URL.
    pub url: String,
    /// Event data sent as the JSON body.
    pub body: serde_json::Value,
    /// Credential for the `x-api-key` header, if the target has one.
    pub api_key: Option<String>,
    /// Correlation id of the originating message.
    pub correlation_id: CorrelationId,
    /// Attempt number of the originating message.
    pub retry_count: u32,
}

/// Response from a forwarding attempt.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Canonical reason phrase for the status code.
    pub status_text: String,
    /// Response body (limited size).
    pub body: String,
    /// Total duration of the request.
    pub duration: Duration,
    /// Whether the request was successful (2xx status).
    pub is_success: bool,
}

impl ForwardResponse {
    /// Turns a non-2xx response into `ForwardingError::Http`.
    ///
    /// # Errors
    ///
    /// Returns `ForwardingError::Http` carrying status and body when the
    /// response was not successful.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success {
            Ok(self)
        } else {
            Err(ForwardingError::http(self.status_code, self.status_text, self.body))
        }
    }
}

impl ForwardingClient {
    /// Creates a new forwarding client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ForwardingError::Configuration` if the HTTP client cannot be
    /// built with the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .build()
            .map_err(|e| {
                ForwardingError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a new forwarding client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `ForwardingError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends the event data to the destination.
    ///
    /// Any HTTP response, including 4xx and 5xx, is returned as `Ok`; callers
    /// decide with [`ForwardResponse::error_for_status`].
    ///
    /// # Errors
    ///
    /// - `Timeout` when the configured timeout elapses, including while a 2xx
    ///   body is still being read
    /// - `Network` for connection and other transport failures, or a 2xx
    ///   body that cannot be read in full
    pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse> {
        let start_time = Instant::now();

        let span = info_span!(
            "forward_request",
            correlation_id = %request.correlation_id,
            url = %request.url,
            retry_count = request.retry_count,
            has_api_key = request.api_key.is_some()
        );

        async move {
            tracing::debug!("sending event downstream");

            let mut http_request = self.client.post(&request.url).json(&request.body);
            if let Some(api_key) = &request.api_key {
                http_request = http_request.header(API_KEY_HEADER, api_key);
            }

            let response = match http_request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let duration = start_time.elapsed();
                    tracing::warn!(duration_ms = duration.as_millis(), error = %e, "request failed");
                    return Err(self.transport_error(&e));
                },
            };

            let forward_response = match read_response(response, start_time).await {
                Ok(forward_response) => forward_response,
                Err(e) => {
                    let duration = start_time.elapsed();
                    tracing::warn!(
                        duration_ms = duration.as_millis(),
                        error = %e,
                        "successful response body could not be read"
                    );
                    return Err(self.transport_error(&e));
                },
            };

            if forward_response.is_success {
                tracing::info!(
                    status = forward_response.status_code,
                    duration_ms = forward_response.duration.as_millis(),
                    "event forwarded"
                );
            } else {
                tracing::warn!(
                    status = forward_response.status_code,
                    duration_ms = forward_response.duration.as_millis(),
                    "downstream rejected event"
                );
            }

            Ok(forward_response)
        }
        .instrument(span)
        .await
    }

    fn transport_error(&self, error: &reqwest::Error) -> ForwardingError {
        if error.is_timeout() {
            let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
            return ForwardingError::timeout(timeout_ms);
        }
        if error.is_connect() {
            return ForwardingError::network(format!("connection failed: {error}"));
        }
        ForwardingError::network(error.to_string())
    }
}

/// Reads status and body.
///
/// A 2xx whose body fails to arrive is an error, since the downstream may not
/// have finished processing. Other statuses keep a placeholder body.
async fn read_response(
    response: Response,
    start_time: Instant,
) -> reqwest::Result<ForwardResponse> {
    let status = response.status();
    let status_code = status.as_u16();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    let is_success = status.is_success();

    let body = match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_RESPONSE_BODY_SIZE => {
            let truncated = String::from_utf8_lossy(&bytes[..MAX_RESPONSE_BODY_SIZE]);
            format!("{truncated}{TRUNCATION_SUFFIX}")
        },
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if is_success => return Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read response body");
            format!("[failed to read response body: {e}]")
        },
    };

    let duration = start_time.elapsed();
    Ok(ForwardResponse { status_code, status_text, body, duration, is_success })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn create_test_request(url: String) -> ForwardRequest {
        ForwardRequest {
            url,
            body: json!({"seller_id": 7, "guid": "c-1"}),
            api_key: Some("secret-key".to_string()),
            correlation_id: CorrelationId::new("msg-1"),
            retry_count: 1,
        }
    }

    #[tokio::test]
    async fn successful_forward() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/fuma/customer/upsert"))
            .and(matchers::header("x-api-key", "secret-key"))
            .and(matchers::header("content-type", "application/json"))
            .and(matchers::body_json(json!({"seller_id": 7, "guid": "c-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ForwardingClient::with_defaults().unwrap();
        let request =
            create_test_request(format!("{}/api/fuma/customer/upsert", mock_server.uri()));

        let response = client.forward(request).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.status_text, "OK");
        assert!(response.is_success);
        assert_eq!(response.body, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn api_key_header_omitted_without_credential() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::header_exists("x-api-key"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = ForwardingClient::with_defaults().unwrap();
        let mut request = create_test_request(format!("{}/upsert", mock_server.uri()));
        request.api_key = None;

        let response = client.forward(request).await.unwrap();
        assert_eq!(response.status_code, 204);
    }

    #[tokio::test]
    async fn error_responses_are_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let client = ForwardingClient::with_defaults().unwrap();
        let request = create_test_request(format!("{}/upsert", mock_server.uri()));

        let response = client.forward(request).await.unwrap();
        assert!(!response.is_success);
        assert_eq!(response.status_code, 503);

        let error = response.error_for_status().unwrap_err();
        assert_eq!(error, ForwardingError::http(503, "Service Unavailable", "maintenance"));
    }

    #[tokio::test]
    async fn slow_downstream_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let config = ClientConfig { timeout: Duration::from_millis(100), ..ClientConfig::default() };
        let client = ForwardingClient::new(config).unwrap();
        let request = create_test_request(format!("{}/upsert", mock_server.uri()));

        let error = client.forward(request).await.unwrap_err();
        assert_eq!(error, ForwardingError::Timeout { timeout_ms: 100 });
        assert_eq!(error.status_code(), 0);
        assert_eq!(error.to_string(), "request timeout after 100ms");
    }

    const TRUNCATED_OK: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial";

    /// Answers one request with `response` once the JSON body has arrived,
    /// then either hangs up or keeps the socket open.
    async fn raw_downstream(response: &'static [u8], hang_up: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buffer = [0_u8; 1024];
            let complete =
                |bytes: &[u8]| bytes.windows(4).any(|w| w == b"\r\n\r\n") && bytes.ends_with(b"}");
            while !complete(&received) {
                let read = socket.read(&mut buffer).await.unwrap();
                if read == 0 {
                    return;
                }
                received.extend_from_slice(&buffer[..read]);
            }

            socket.write_all(response).await.unwrap();
            socket.flush().await.unwrap();
            if !hang_up {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });

        format!("http://{addr}/upsert")
    }

    #[tokio::test]
    async fn truncated_success_body_is_network_error() {
        let url = raw_downstream(TRUNCATED_OK, true).await;
        let client = ForwardingClient::with_defaults().unwrap();

        let error = client.forward(create_test_request(url)).await.unwrap_err();
        assert!(matches!(error, ForwardingError::Network { .. }), "got {error:?}");
    }

    #[tokio::test]
    async fn stalled_success_body_times_out() {
        let url = raw_downstream(TRUNCATED_OK, false).await;
        let config = ClientConfig { timeout: Duration::from_millis(200), ..ClientConfig::default() };
        let client = ForwardingClient::new(config).unwrap();

        let error = client.forward(create_test_request(url)).await.unwrap_err();
        assert_eq!(error, ForwardingError::Timeout { timeout_ms: 200 });
    }

    #[tokio::test]
    async fn unreachable_downstream_is_network_error() {
        let client = ForwardingClient::with_defaults().unwrap();
        let request = create_test_request("http://127.0.0.1:1/upsert".to_string());

        let error = client.forward(request).await.unwrap_err();
        assert!(matches!(error, ForwardingError::Network { .. }));
    }
}
