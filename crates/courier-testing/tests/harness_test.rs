#![allow(clippy::unwrap_used)]

use std::time::Duration;

use courier_core::{Clock, CorrelationId};
use courier_forwarding::{ForwardingError, CUSTOMER_UPSERT_PATH};
use courier_testing::{EventBuilder, ForwardingHarness};

#[tokio::test]
async fn harness_forwards_to_registered_seller() {
    let harness = ForwardingHarness::new().await.unwrap();
    let target = harness.add_seller(11).await;
    assert_eq!(target.api_key.as_deref(), Some("key-11"));

    harness.downstream.respond_for_key(CUSTOMER_UPSERT_PATH, "key-11").await;

    let data = EventBuilder::customer(11).data();
    harness.gateway().upsert_customer(&data, &CorrelationId::new("h-1"), 1).await.unwrap();

    let records = harness.audit_records_for("h-1").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].created_at, harness.clock.now_utc());
    harness.downstream.assert_request_count(1).await;
}

#[tokio::test]
async fn harness_clock_advances_audit_timestamps() {
    let harness = ForwardingHarness::new().await.unwrap();
    let data = EventBuilder::customer(1).without_seller().data();

    harness.gateway().upsert_customer(&data, &CorrelationId::new("h-2"), 1).await.unwrap_err();
    harness.clock.advance(Duration::from_secs(60));
    harness.gateway().upsert_customer(&data, &CorrelationId::new("h-2"), 2).await.unwrap_err();

    let records = harness.audit_records_for("h-2").await;
    assert_eq!(records.len(), 2);
    assert_eq!((records[1].created_at - records[0].created_at).num_seconds(), 60);
}

#[tokio::test]
async fn slow_downstream_times_out() {
    let harness = ForwardingHarness::with_timeout(Duration::from_millis(100)).await.unwrap();
    harness.add_seller(3).await;
    harness.downstream.respond_slowly(CUSTOMER_UPSERT_PATH, Duration::from_secs(2)).await;

    let data = EventBuilder::customer(3).data();
    let error =
        harness.gateway().upsert_customer(&data, &CorrelationId::new("h-3"), 1).await.unwrap_err();

    assert!(matches!(error, ForwardingError::Timeout { .. }));
    assert_eq!(error.status_code(), 0);
}
