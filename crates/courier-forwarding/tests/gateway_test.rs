//! Integration tests for the forwarding gateway.
//!
//! Runs the gateway against a wiremock downstream with in-memory resolver and
//! recorder, checking the one-audit-record-per-attempt guarantee on every
//! exit path.

#![allow(clippy::unwrap_used)]

use std::{
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};

use courier_core::{Clock, CorrelationId, RoutingTarget, SellerId, TestClock};
use courier_forwarding::{
    storage::mock::{MockAuditRecorder, MockRoutingResolver},
    ClientConfig, ForwardingClient, ForwardingError, ForwardingGateway,
};
use serde_json::{json, Value};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

struct Fixture {
    gateway: ForwardingGateway,
    resolver: MockRoutingResolver,
    recorder: MockAuditRecorder,
    clock: TestClock,
    server: MockServer,
}

impl Fixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let resolver = MockRoutingResolver::new();
        let recorder = MockAuditRecorder::new();
        let clock = TestClock::with_start_time(UNIX_EPOCH + Duration::from_secs(1_760_000_000));
        let client = ForwardingClient::new(ClientConfig {
            timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        })
        .unwrap();

        let gateway = ForwardingGateway::new(
            Arc::new(resolver.clone()),
            Arc::new(recorder.clone()),
            client,
            Arc::new(clock.clone()),
        );

        Self { gateway, resolver, recorder, clock, server }
    }

    /// Registers seller 42 pointing at the mock server.
    async fn with_seller(self) -> Self {
        let target = RoutingTarget::new(SellerId(42), self.server.uri()).with_api_key("k-42");
        self.resolver.add_target(target).await;
        self
    }
}

fn error_document(message: &str) -> Value {
    serde_json::from_str(message).unwrap()
}

#[tokio::test]
async fn customer_upsert_success_is_audited() {
    let fixture = Fixture::new().await.with_seller().await;
    let data = json!({"seller_id": 42, "guid": "cust-1", "name": "Ada"});

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/fuma/customer/upsert"))
        .and(matchers::header("x-api-key", "k-42"))
        .and(matchers::body_json(data.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"ok\"}"))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let correlation_id = CorrelationId::new("msg-100");
    fixture.gateway.upsert_customer(&data, &correlation_id, 1).await.unwrap();

    let records = fixture.recorder.recorded().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.title, "upsert-customer");
    assert_eq!(record.request, data);
    assert_eq!(record.correlation_id, correlation_id);
    assert_eq!(record.error_message, "");
    assert_eq!(record.response_message, "{\"status\":\"ok\"}");
    assert_eq!(record.created_at, fixture.clock.now_utc());
}

#[tokio::test]
async fn doc_offers_use_their_own_path() {
    let fixture = Fixture::new().await.with_seller().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/fuma/doc-orders/upsert"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let data = json!({"seller_id": "42", "offers": []});
    fixture.gateway.upsert_doc_offers(&data, &CorrelationId::new("msg-101"), 2).await.unwrap();

    let records = fixture.recorder.recorded().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "upsert-doc-offers");
    assert!(records[0].succeeded());
}

#[tokio::test]
async fn downstream_error_is_audited_with_status() {
    let fixture = Fixture::new().await.with_seller().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("{\"error\":\"db down\"}"))
        .mount(&fixture.server)
        .await;

    let data = json!({"seller_id": 42});
    let error =
        fixture.gateway.upsert_customer(&data, &CorrelationId::new("msg-102"), 2).await.unwrap_err();

    assert_eq!(error.status_code(), 500);

    let records = fixture.recorder.recorded().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].response_message, "");

    let document = error_document(&records[0].error_message);
    assert_eq!(document["statusCode"], 500);
    assert_eq!(document["statusText"], "Internal Server Error");
    assert_eq!(document["responseData"], "{\"error\":\"db down\"}");
    assert_eq!(document["retryCount"], 2);
}

#[tokio::test]
async fn missing_routing_key_is_audited_without_lookup() {
    let fixture = Fixture::new().await;
    let data = json!({"guid": "cust-2"});

    let error =
        fixture.gateway.upsert_customer(&data, &CorrelationId::new("msg-103"), 1).await.unwrap_err();

    assert_eq!(error, ForwardingError::MissingRoutingKey);
    assert!(fixture.resolver.lookups().await.is_empty());

    let records = fixture.recorder.recorded().await;
    assert_eq!(records.len(), 1);
    let document = error_document(&records[0].error_message);
    assert_eq!(document["statusCode"], 0);
    assert_eq!(document["message"], "seller_id is required in event data");
}

#[tokio::test]
async fn inactive_seller_is_unavailable() {
    let fixture = Fixture::new().await;
    fixture
        .resolver
        .add_target(RoutingTarget::new(SellerId(7), fixture.server.uri()).inactive())
        .await;

    let error = fixture
        .gateway
        .upsert_customer(&json!({"seller_id": 7}), &CorrelationId::unknown(), 1)
        .await
        .unwrap_err();

    assert_eq!(error, ForwardingError::target_unavailable(SellerId(7)));
    assert_eq!(fixture.recorder.recorded().await.len(), 1);
    assert!(fixture.server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn zero_string_routing_key_fails_at_lookup() {
    let fixture = Fixture::new().await;

    let error = fixture
        .gateway
        .upsert_customer(&json!({"seller_id": "0"}), &CorrelationId::new("msg-104"), 1)
        .await
        .unwrap_err();

    assert_eq!(error, ForwardingError::target_unavailable(SellerId(0)));
    assert_eq!(fixture.resolver.lookups().await, vec![SellerId(0)]);

    let records = fixture.recorder.recorded().await;
    assert_eq!(records.len(), 1);
    let document = error_document(&records[0].error_message);
    assert_eq!(document["message"], "seller with id 0 not found or inactive");
}

#[tokio::test]
async fn resolver_failure_is_resolution_error() {
    let fixture = Fixture::new().await.with_seller().await;
    fixture.resolver.inject_resolve_error("pool timed out").await;

    let error = fixture
        .gateway
        .upsert_customer(&json!({"seller_id": 42}), &CorrelationId::new("msg-104"), 1)
        .await
        .unwrap_err();

    assert!(matches!(error, ForwardingError::Resolution { .. }));
    assert_eq!(fixture.recorder.recorded().await.len(), 1);
}

#[tokio::test]
async fn audit_failure_does_not_mask_success() {
    let fixture = Fixture::new().await.with_seller().await;
    fixture.recorder.inject_record_error("transfer_log unavailable").await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&fixture.server)
        .await;

    let result = fixture
        .gateway
        .upsert_customer(&json!({"seller_id": 42}), &CorrelationId::new("msg-105"), 1)
        .await;

    assert!(result.is_ok());
    assert!(fixture.recorder.recorded().await.is_empty());
}

#[tokio::test]
async fn audit_failure_does_not_mask_error() {
    let fixture = Fixture::new().await.with_seller().await;
    fixture.recorder.inject_record_error("transfer_log unavailable").await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad customer"))
        .mount(&fixture.server)
        .await;

    let error = fixture
        .gateway
        .upsert_customer(&json!({"seller_id": 42}), &CorrelationId::new("msg-106"), 1)
        .await
        .unwrap_err();

    assert_eq!(error, ForwardingError::http(422, "Unprocessable Entity", "bad customer"));
}

#[tokio::test]
async fn timeout_is_audited_with_status_zero() {
    let fixture = Fixture::new().await.with_seller().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&fixture.server)
        .await;

    let error = fixture
        .gateway
        .upsert_customer(&json!({"seller_id": 42}), &CorrelationId::new("msg-107"), 3)
        .await
        .unwrap_err();

    assert!(matches!(error, ForwardingError::Timeout { .. }));

    let records = fixture.recorder.recorded().await;
    let document = error_document(&records[0].error_message);
    assert_eq!(document["statusCode"], 0);
    assert_eq!(document["retryCount"], 3);
}
