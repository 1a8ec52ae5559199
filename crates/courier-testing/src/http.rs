//! Mock downstream API for forwarding tests.

use std::time::Duration;

use serde_json::Value;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

/// Downstream seller API backed by a wiremock server.
///
/// Every request is recorded; use [`DownstreamServer::requests_to`] to
/// inspect what courier actually sent.
pub struct DownstreamServer {
    server: MockServer,
}

impl DownstreamServer {
    /// Starts a server on a random local port.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// Base URL, suitable as a routing target address.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Answers `POST path` with `status` and an empty body.
    pub async fn respond(&self, path_str: &str, status: u16) {
        self.respond_with_body(path_str, status, "").await;
    }

    /// Answers `POST path` with `status` and `body`.
    pub async fn respond_with_body(&self, path_str: &str, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(path_str))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Answers `POST path` with 200 only when the `x-api-key` header matches.
    pub async fn respond_for_key(&self, path_str: &str, api_key: &str) {
        Mock::given(method("POST"))
            .and(path(path_str))
            .and(header(courier_forwarding::API_KEY_HEADER, api_key))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Answers `POST path` with 200 after `delay`.
    pub async fn respond_slowly(&self, path_str: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(path_str))
            .respond_with(ResponseTemplate::new(200).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// All requests received so far.
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Requests received on `path`.
    pub async fn requests_to(&self, path_str: &str) -> Vec<Request> {
        self.received_requests()
            .await
            .into_iter()
            .filter(|request| request.url.path() == path_str)
            .collect()
    }

    /// JSON bodies of the requests received on `path`.
    ///
    /// Bodies that are not JSON are skipped.
    pub async fn json_bodies_to(&self, path_str: &str) -> Vec<Value> {
        self.requests_to(path_str)
            .await
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    /// Asserts that exactly `expected` requests were received in total.
    pub async fn assert_request_count(&self, expected: usize) {
        let received = self.received_requests().await.len();
        assert_eq!(received, expected, "expected {expected} downstream requests, received {received}");
    }
}
