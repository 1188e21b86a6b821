//! End-to-end tests for the entity write path: creation, versioning,
//! duplicate detection classification, and attribute handling.

mod common;

use common::{harness, json_map, CanonicalOrderProcessor};

use std::sync::Arc;

use serde_json::json;

use entity_exchange_domain::repositories::EntityFilter;
use entity_exchange_domain::services::KEY_DUPLICATE_DETECTION;
use entity_exchange_domain::{
    DuplicateDetectionResult, EntityState, ErrorCode, HashConfig, ProcessorConfig,
};

fn source_config() -> ProcessorConfig {
    ProcessorConfig::new("order-mapper").with_state_tracking()
}

#[tokio::test]
async fn create_v1_records_two_transitions() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let handler = h.handler(Arc::new(CanonicalOrderProcessor), source_config());
    let mut message = common::order_message("tenant-a", "ORD-1", json_map(&[("a", json!(1))]));

    let result = handler.execute(&mut message).await;

    assert!(result.success, "execution failed: {:?}", result.error_message);
    assert_eq!(result.entities_created.len(), 1);
    assert!(message.processed_at.is_some());

    let entity = h
        .entity_service
        .get_entity_by_external_id("ORD-1", "shopify")
        .await
        .unwrap()
        .expect("entity persisted");
    assert_eq!(entity.version(), 1);
    assert!(entity.content_hash().is_some());

    let history = h
        .state_tracking
        .get_entity_state_history(entity.id())
        .await
        .unwrap()
        .expect("history recorded");
    assert_eq!(history.total_transitions, 2);
    assert_eq!(history.current_state, EntityState::Completed);
    assert_eq!(history.transitions[0].from_state(), &EntityState::Received);
    assert_eq!(history.transitions[0].to_state(), &EntityState::Processing);
    assert_eq!(history.transitions[1].to_state(), &EntityState::Completed);
}

#[tokio::test]
async fn create_v2_for_changed_content() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let handler = h.handler(Arc::new(CanonicalOrderProcessor), source_config());

    let mut first = common::order_message("tenant-a", "ORD-1", json_map(&[("a", json!(1))]));
    assert!(handler.execute(&mut first).await.success);

    let mut second = common::order_message("tenant-a", "ORD-1", json_map(&[("a", json!(2))]));
    let result = handler.execute(&mut second).await;
    assert!(result.success);
    assert_eq!(result.entities_updated.len(), 1);

    let max_version = h
        .entity_service
        .get_max_version("ORD-1", "shopify")
        .await
        .unwrap();
    assert_eq!(max_version, 2);

    let versions = h
        .entity_service
        .get_all_versions("ORD-1", "shopify")
        .await
        .unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version(), 1);
    assert_eq!(versions[1].version(), 2);
    assert_ne!(versions[0].content_hash(), versions[1].content_hash());

    // v1 is untouched and the new version starts its own ledger at 1
    let v2_history = h
        .state_tracking
        .get_entity_state_history(versions[1].id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(v2_history.transitions[0].sequence_number(), 1);
}

#[tokio::test]
async fn identical_content_same_external_id_is_a_new_version() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let handler = h.handler(Arc::new(CanonicalOrderProcessor), source_config());
    let payload = json_map(&[("a", json!(1))]);

    let mut first = common::order_message("tenant-a", "ORD-1", payload.clone());
    assert!(handler.execute(&mut first).await.success);

    let mut replay = common::order_message("tenant-a", "ORD-1", payload);
    let result = handler.execute(&mut replay).await;
    assert!(result.success);

    let latest = h
        .entity_service
        .get_entity_by_external_id("ORD-1", "shopify")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.version(), 2);

    let detection = DuplicateDetectionResult::from_value(
        latest.attributes().get(KEY_DUPLICATE_DETECTION).unwrap(),
    )
    .unwrap();
    assert!(detection.is_duplicate);
    assert_eq!(detection.reason, DuplicateDetectionResult::REASON_NEW_VERSION);
    assert_eq!(detection.confidence, 90);
    assert!(!detection.is_suspicious);

    // Both versions carry the same fingerprint
    let versions = h
        .entity_service
        .get_all_versions("ORD-1", "shopify")
        .await
        .unwrap();
    assert_eq!(versions[0].content_hash(), versions[1].content_hash());
}

#[tokio::test]
async fn identical_content_different_external_id_is_suspicious() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let handler = h.handler(Arc::new(CanonicalOrderProcessor), source_config());
    let payload = json_map(&[("a", json!(1))]);

    let mut first = common::order_message("tenant-a", "ORD-1", payload.clone());
    assert!(handler.execute(&mut first).await.success);

    let mut cloned = common::order_message("tenant-a", "ORD-2", payload);
    let result = handler.execute(&mut cloned).await;
    assert!(result.success);
    assert_eq!(result.entities_created.len(), 1);

    let entity = h
        .entity_service
        .get_entity_by_external_id("ORD-2", "shopify")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.version(), 1);

    let detection = DuplicateDetectionResult::from_value(
        entity.attributes().get(KEY_DUPLICATE_DETECTION).unwrap(),
    )
    .unwrap();
    assert_eq!(
        detection.reason,
        DuplicateDetectionResult::REASON_SAME_SOURCE_CONTENT_MATCH
    );
    assert!(detection.is_suspicious);
    assert!(detection
        .similar_entity_external_ids
        .contains(&"ORD-1".to_string()));
    assert!(!detection.similar_entity_ids.is_empty());
}

#[tokio::test]
async fn max_version_is_zero_for_missing_tuple() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let max_version = h
        .entity_service
        .get_max_version("NO-SUCH-ORDER", "shopify")
        .await
        .unwrap();
    assert_eq!(max_version, 0);
}

#[tokio::test]
async fn duplicate_tuple_create_is_rejected() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    h.entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"a": 1})), None, None)
        .await
        .unwrap();

    // Same (tenant, source, external_id, version) collides
    let err = h
        .entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"a": 2})), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Duplicate);
}

#[tokio::test]
async fn versions_are_gapless_after_service_calls() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    h.entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"n": 0})), None, None)
        .await
        .unwrap();
    for n in 1..=4 {
        let (_, version) = h
            .entity_service
            .create_new_version("ORD-1", "shopify", Some(&json!({ "n": n })), None, None)
            .await
            .unwrap();
        assert_eq!(version, n + 1);
    }

    let versions = h
        .entity_service
        .get_all_versions("ORD-1", "shopify")
        .await
        .unwrap();
    let numbers: Vec<i64> = versions.iter().map(|e| e.version()).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn versioning_without_prior_entity_requires_canonical_type() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let err = h
        .entity_service
        .create_new_version("GHOST", "shopify", Some(&json!({"a": 1})), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn attribute_update_merges_shallowly() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let entity_id = h
        .entity_service
        .create_entity(
            "ORD-1",
            "order",
            "shopify",
            Some(&json!({"a": 1})),
            Some(json_map(&[("kept", json!("original")), ("replaced", json!(1))])),
            None,
        )
        .await
        .unwrap();

    h.entity_service
        .update_entity_attributes(
            entity_id,
            json_map(&[("replaced", json!(2)), ("added", json!(true))]),
        )
        .await
        .unwrap();

    let entity = h.entity_service.require_entity(entity_id).await.unwrap();
    assert_eq!(entity.attributes()["kept"], json!("original"));
    assert_eq!(entity.attributes()["replaced"], json!(2));
    assert_eq!(entity.attributes()["added"], json!(true));
}

#[tokio::test]
async fn hash_config_exclusions_shape_detection() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let hash_config = HashConfig::excluding(["total_amount"]);

    h.entity_service
        .create_entity(
            "ORD-1",
            "order",
            "shopify",
            Some(&json!({"sku": "X", "total_amount": 10.0})),
            None,
            Some(&hash_config),
        )
        .await
        .unwrap();

    // Amount differs but is excluded, so the content matches ORD-1
    let detection = h
        .detection_service
        .detect_duplicates(
            &json!({"sku": "X", "total_amount": 99.0}),
            "order",
            "shopify",
            "ORD-1",
            Some(&hash_config),
            None,
        )
        .await
        .unwrap();
    assert!(detection.is_duplicate);
    assert_eq!(detection.reason, DuplicateDetectionResult::REASON_NEW_VERSION);
}

#[tokio::test]
async fn exclude_entity_id_suppresses_self_matches() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let payload = json!({"a": 1});
    let entity_id = h
        .entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&payload), None, None)
        .await
        .unwrap();

    let detection = h
        .detection_service
        .detect_duplicates(&payload, "order", "shopify", "ORD-1", None, Some(entity_id))
        .await
        .unwrap();
    assert!(!detection.is_duplicate);
    assert_eq!(detection.reason, DuplicateDetectionResult::REASON_NEW);
    assert_eq!(detection.confidence, 100);
}

#[tokio::test]
async fn list_and_delete_round_trip() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    for i in 0..3 {
        h.entity_service
            .create_entity(
                &format!("ORD-{}", i),
                "order",
                "shopify",
                Some(&json!({ "i": i })),
                None,
                None,
            )
            .await
            .unwrap();
    }
    h.entity_service
        .create_entity("CUST-1", "customer", "crm", Some(&json!({"name": "Ann"})), None, None)
        .await
        .unwrap();

    let filter = EntityFilter {
        canonical_type: Some("order".to_string()),
        ..Default::default()
    };
    let (entities, total) = h.entity_service.list_entities(&filter, 2, 0).await.unwrap();
    assert_eq!(entities.len(), 2);
    assert_eq!(total, 3);

    let victim = entities[0].id();
    assert!(h.entity_service.delete_entity(victim).await.unwrap());
    assert!(!h.entity_service.delete_entity(victim).await.unwrap());
    assert!(h.entity_service.get_entity(victim).await.unwrap().is_none());
}

#[tokio::test]
async fn non_source_processing_requires_an_existing_entity() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let config = ProcessorConfig::new("enricher").non_source();
    let err = h
        .processing_service
        .process_entity(
            "GHOST",
            "order",
            "shopify",
            &json!({"a": 1}),
            &config,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn non_source_processing_merges_attributes_without_versioning() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let source_cfg = ProcessorConfig::new("order-mapper");
    h.processing_service
        .process_entity(
            "ORD-1",
            "order",
            "shopify",
            &json!({"a": 1}),
            &source_cfg,
            None,
            None,
        )
        .await
        .unwrap();

    let enrich_cfg = ProcessorConfig::new("enricher").non_source();
    let outcome = h
        .processing_service
        .process_entity(
            "ORD-1",
            "order",
            "shopify",
            &json!({"a": 1}),
            &enrich_cfg,
            Some(json_map(&[("enriched", json!(true))])),
            None,
        )
        .await
        .unwrap();

    assert!(!outcome.is_new_entity);
    assert!(!outcome.content_changed);
    assert_eq!(outcome.entity_version, 1);

    let entity = h
        .entity_service
        .get_entity_by_external_id("ORD-1", "shopify")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.version(), 1, "non-source processors never version");
    assert_eq!(entity.attributes()["enriched"], json!(true));
}
