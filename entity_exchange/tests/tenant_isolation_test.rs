//! Integration tests for tenant isolation and the tenant registry: scoped
//! queries, context scoping, cache invalidation, and per-key configuration.

mod common;

use common::harness;

use serde_json::json;

use entity_exchange_domain::repositories::TenantUpdate;
use entity_exchange_domain::{ErrorCode, Tenant};

#[tokio::test]
async fn identical_tuples_are_isolated_per_tenant() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    h.seed_tenant("tenant-b").await;

    h.context.set_current_tenant("tenant-a").unwrap();
    let id_a = h
        .entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"owner": "a"})), None, None)
        .await
        .unwrap();

    h.context.set_current_tenant("tenant-b").unwrap();
    let id_b = h
        .entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"owner": "b"})), None, None)
        .await
        .unwrap();

    // Same tuple, both at version 1, different rows
    assert_ne!(id_a, id_b);

    h.context.set_current_tenant("tenant-a").unwrap();
    let seen_from_a = h
        .entity_service
        .get_entity_by_external_id("ORD-1", "shopify")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen_from_a.id(), id_a);
    assert_eq!(seen_from_a.tenant_id(), "tenant-a");
    assert_eq!(seen_from_a.version(), 1);

    h.context.set_current_tenant("tenant-b").unwrap();
    let seen_from_b = h
        .entity_service
        .get_entity_by_external_id("ORD-1", "shopify")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen_from_b.id(), id_b);
    assert_eq!(seen_from_b.version(), 1);

    // A's entity is invisible under B's context, even by primary key
    assert!(h.entity_service.get_entity(id_a).await.unwrap().is_none());
}

#[tokio::test]
async fn operations_without_a_tenant_fail_validation() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    h.context.clear_current_tenant();

    let err = h
        .entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"a": 1})), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);

    let err = h
        .entity_service
        .get_entity_by_external_id("ORD-1", "shopify")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn scoped_tenant_pushes_nest_and_restore() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    h.seed_tenant("tenant-b").await;

    h.context.set_current_tenant("tenant-a").unwrap();
    h.entity_service
        .create_entity("ORD-A", "order", "shopify", Some(&json!({"a": 1})), None, None)
        .await
        .unwrap();

    {
        let _scope = h.context.push_tenant("tenant-b").unwrap();
        h.entity_service
            .create_entity("ORD-B", "order", "shopify", Some(&json!({"b": 1})), None, None)
            .await
            .unwrap();
        assert!(h
            .entity_service
            .get_entity_by_external_id("ORD-A", "shopify")
            .await
            .unwrap()
            .is_none());
    }

    // Back under tenant-a after the scope ends
    assert_eq!(h.context.current_tenant_id().as_deref(), Some("tenant-a"));
    assert!(h
        .entity_service
        .get_entity_by_external_id("ORD-A", "shopify")
        .await
        .unwrap()
        .is_some());
    assert!(h
        .entity_service
        .get_entity_by_external_id("ORD-B", "shopify")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn duplicate_tenant_ids_are_rejected() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let err = h
        .tenant_service
        .create_tenant(Tenant::new("tenant-a", "Impostor Inc").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn tenant_config_entries_carry_their_own_timestamps() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    h.tenant_service
        .update_tenant_config("batch_size", json!(25))
        .await
        .unwrap();
    h.tenant_service
        .update_tenant_config("feature_flags", json!({"fast_path": true}))
        .await
        .unwrap();

    let tenant = h.tenant_service.get_current_tenant().await.unwrap();
    let batch = tenant.tenant_config().get("batch_size").unwrap();
    let flags = tenant.tenant_config().get("feature_flags").unwrap();
    assert_eq!(batch.value, json!(25));
    assert_eq!(flags.value, json!({"fast_path": true}));

    // Overwriting a key refreshes its timestamp
    let before = batch.updated_at;
    h.tenant_service
        .update_tenant_config("batch_size", json!(50))
        .await
        .unwrap();
    let tenant = h.tenant_service.get_current_tenant().await.unwrap();
    let batch = tenant.tenant_config().get("batch_size").unwrap();
    assert_eq!(batch.value, json!(50));
    assert!(batch.updated_at >= before);

    let value = h
        .tenant_service
        .get_tenant_config_value("missing_key", json!("fallback"))
        .await
        .unwrap();
    assert_eq!(value, json!("fallback"));
}

#[tokio::test]
async fn mutations_invalidate_the_context_cache() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    // Prime the cache
    let original = h.tenant_service.get_current_tenant().await.unwrap();
    assert_eq!(original.customer_name(), "tenant-a Inc");
    assert!(h.context.cached_tenant("tenant-a").is_some());

    let update = TenantUpdate {
        customer_name: Some("Renamed Industries".to_string()),
        ..Default::default()
    };
    h.tenant_service.update_tenant(update).await.unwrap();

    // The stale cache entry is gone and the fresh read sees the new name
    let refreshed = h.tenant_service.get_current_tenant().await.unwrap();
    assert_eq!(refreshed.customer_name(), "Renamed Industries");
}

#[tokio::test]
async fn activation_toggles_round_trip() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    h.tenant_service.deactivate_tenant("tenant-a").await.unwrap();
    let tenant = h.tenant_service.get_current_tenant().await.unwrap();
    assert!(!tenant.is_active());

    h.tenant_service.activate_tenant("tenant-a").await.unwrap();
    let tenant = h.tenant_service.get_current_tenant().await.unwrap();
    assert!(tenant.is_active());

    let err = h
        .tenant_service
        .activate_tenant("no-such-tenant")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn state_ledger_is_tenant_scoped() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    h.seed_tenant("tenant-b").await;

    h.context.set_current_tenant("tenant-a").unwrap();
    let entity_id = h
        .entity_service
        .create_entity("ORD-1", "order", "shopify", Some(&json!({"a": 1})), None, None)
        .await
        .unwrap();
    h.state_tracking
        .record_transition(
            entity_exchange_domain::repositories::NewStateTransition::new(
                entity_id,
                entity_exchange_domain::EntityState::Received,
                entity_exchange_domain::EntityState::Processing,
                "mapper",
            ),
        )
        .await
        .unwrap();

    // Under the other tenant the history is invisible
    h.context.set_current_tenant("tenant-b").unwrap();
    assert!(h
        .state_tracking
        .get_entity_state_history(entity_id)
        .await
        .unwrap()
        .is_none());

    let stats = h.state_tracking.get_state_statistics(None, None).await.unwrap();
    assert_eq!(stats.total_transitions, 0);
}
