//! Integration tests for the processor handler execution contract: error
//! classification, retry reporting, dead-letter routing, ledger writes, and
//! the untyped-map compatibility shim.

mod common;

use common::{
    harness, json_map, CanonicalOrderProcessor, FailingProcessor, FlakyProcessor,
    PassthroughProcessor, RejectingProcessor,
};

use std::sync::Arc;

use serde_json::json;

use entity_exchange::application::handler::retry_delay_seconds;
use entity_exchange_domain::{EntityState, ErrorCode, ProcessingStatus, ProcessorConfig};

#[tokio::test]
async fn non_source_without_entity_id_dead_letters() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let config = ProcessorConfig::new("enricher").non_source().with_state_tracking();
    let handler = h.handler(Arc::new(PassthroughProcessor), config);

    let mut message = common::order_message("tenant-a", "ORD-1", json_map(&[("a", json!(1))]));
    let result = handler.execute(&mut message).await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::MissingEntityId));
    assert!(!result.can_retry);
    assert_eq!(result.routing_info["dead_letter"], json!(true));

    // Fails fast: nothing reaches the ledgers
    let stats = h.state_tracking.get_state_statistics(None, None).await.unwrap();
    assert_eq!(stats.total_transitions, 0);
}

#[tokio::test]
async fn validation_rejection_is_terminal_and_recorded() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let entity_id = h
        .entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"a": 1})), None, None)
        .await
        .unwrap();

    let config = ProcessorConfig::new("enricher").non_source().with_state_tracking();
    let handler = h.handler(Arc::new(RejectingProcessor), config);

    let mut message = common::order_message("tenant-a", "ORD-1", json_map(&[("a", json!(1))]))
        .with_entity(entity_id.to_string(), Some(1));
    let result = handler.execute(&mut message).await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::InvalidMessage));
    assert!(!result.can_retry);

    // RECEIVED -> PROCESSING followed by PROCESSING -> SYSTEM_ERROR
    let current = h.state_tracking.get_current_state(entity_id).await.unwrap();
    assert_eq!(current, Some(EntityState::SystemError));

    let errors = h.error_service.find_by_entity_id(entity_id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type_code(), "INVALID_MESSAGE");
}

#[tokio::test]
async fn transient_failure_reports_retry_then_succeeds() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let config = ProcessorConfig::new("order-mapper");
    let handler = h.handler(Arc::new(FlakyProcessor::failing_times(1)), config);

    let mut message = common::order_message("tenant-a", "ORD-1", json_map(&[("a", json!(1))]));

    let first = handler.execute(&mut message).await;
    assert!(!first.success);
    assert_eq!(first.error_code, Some(ErrorCode::ServiceError));
    assert!(first.can_retry);
    assert_eq!(first.retry_after_seconds, Some(1));

    // The host requeues with an incremented retry count
    message.increment_retry();
    assert!(message.can_retry());

    let second = handler.execute(&mut message).await;
    assert!(second.success, "retry should succeed: {:?}", second.error_message);
    assert_eq!(second.status, ProcessingStatus::Success);
}

#[tokio::test]
async fn returned_failure_keeps_processor_retry_decision() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let entity_id = h
        .entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"a": 1})), None, None)
        .await
        .unwrap();

    let config = ProcessorConfig::new("deliverer").non_source().with_state_tracking();
    let handler = h.handler(Arc::new(FailingProcessor), config);

    let mut message = common::order_message("tenant-a", "ORD-1", json_map(&[("a", json!(1))]))
        .with_entity(entity_id.to_string(), Some(1));
    let result = handler.execute(&mut message).await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::ProcessingFailure));
    assert!(result.can_retry, "processor-provided retry flag is preserved");

    let errors = h.error_service.find_by_entity_id(entity_id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type_code(), "PROCESSING_FAILURE");
    assert_eq!(errors[0].processing_step(), "deliverer");

    let current = h.state_tracking.get_current_state(entity_id).await.unwrap();
    assert_eq!(current, Some(EntityState::SystemError));
}

#[tokio::test]
async fn untyped_map_shim_round_trips() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let config = ProcessorConfig::new("order-mapper").with_state_tracking();
    let handler = h.handler(Arc::new(CanonicalOrderProcessor), config);

    let inbound = json!({
        "message_id": "11111111-1111-1111-1111-111111111111",
        "correlation_id": "22222222-2222-2222-2222-222222222222",
        "message_type": "entity_processing",
        "entity_reference": {
            "entity_id": null,
            "external_id": "ORD-9",
            "canonical_type": "order",
            "source": "shopify",
            "tenant_id": "tenant-a",
            "version": null
        },
        "payload": {"a": 9},
        "metadata": {},
        "routing_info": {},
        "retry_count": 0,
        "max_retries": 3
    });

    let outcome = handler.handle_message(inbound).await.unwrap();

    assert_eq!(outcome["success"], json!(true));
    assert_eq!(outcome["status"], json!("SUCCESS"));
    assert_eq!(
        outcome["original_message_id"],
        json!("11111111-1111-1111-1111-111111111111")
    );
    assert_eq!(
        outcome["correlation_id"],
        json!("22222222-2222-2222-2222-222222222222")
    );
    assert_eq!(outcome["entities_created"].as_array().unwrap().len(), 1);

    let entity = h
        .entity_service
        .get_entity_by_external_id("ORD-9", "shopify")
        .await
        .unwrap();
    assert!(entity.is_some());
}

#[tokio::test]
async fn malformed_untyped_map_is_rejected() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let handler = h.handler(
        Arc::new(PassthroughProcessor),
        ProcessorConfig::new("order-mapper"),
    );

    let err = handler.handle_message(json!({"payload": {}})).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidMessage);
}

#[tokio::test]
async fn persistence_failure_does_not_downgrade_success() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let config = ProcessorConfig::new("order-mapper");
    let handler = h.handler(Arc::new(CanonicalOrderProcessor), config);

    // Blank external id makes persistence fail validation while the
    // processor itself succeeds.
    let mut message = common::order_message("tenant-a", " ", json_map(&[("a", json!(1))]));
    let result = handler.execute(&mut message).await;

    assert!(result.success);
    assert!(result.entities_created.is_empty());
    assert!(result.entities_updated.is_empty());
}

#[tokio::test]
async fn blank_tenant_is_an_invalid_message() {
    let h = harness().await;

    let handler = h.handler(
        Arc::new(PassthroughProcessor),
        ProcessorConfig::new("order-mapper"),
    );

    let mut message = common::order_message("  ", "ORD-1", json_map(&[("a", json!(1))]));
    let result = handler.execute(&mut message).await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::InvalidMessage));
    assert!(!result.can_retry);
}

#[test]
fn backoff_table_matches_contract() {
    let expectations = [(0, 1), (1, 2), (2, 4), (8, 256), (10, 300)];
    for (retry_count, expected) in expectations {
        assert_eq!(retry_delay_seconds(retry_count), expected);
    }
}
