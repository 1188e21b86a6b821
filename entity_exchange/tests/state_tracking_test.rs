//! Integration tests for the state-transition ledger: ordering, derived
//! queries, statistics, and the message annotation helper.

mod common;

use common::{harness, json_map};

use serde_json::json;

use entity_exchange_domain::repositories::{NewStateTransition, StateTransitionFilter};
use entity_exchange_domain::{EntityId, EntityState, ErrorCode, TransitionType};

async fn seeded_entity(h: &common::TestHarness, external_id: &str) -> EntityId {
    h.entity_service
        .create_entity(
            external_id,
            "order",
            "shopify",
            Some(&json!({ "id": external_id })),
            None,
            None,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn sequence_numbers_are_gapless_from_one() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    let entity_id = seeded_entity(&h, "ORD-1").await;

    let chain = [
        (EntityState::Received, EntityState::Processing),
        (EntityState::Processing, EntityState::Validated),
        (EntityState::Validated, EntityState::Transformed),
        (EntityState::Transformed, EntityState::Completed),
    ];
    for (from, to) in chain {
        h.state_tracking
            .record_transition(NewStateTransition::new(entity_id, from, to, "pipeline"))
            .await
            .unwrap();
    }

    let history = h
        .state_tracking
        .get_entity_state_history(entity_id)
        .await
        .unwrap()
        .unwrap();

    let sequence: Vec<i64> = history
        .transitions
        .iter()
        .map(|t| t.sequence_number())
        .collect();
    assert_eq!(sequence, vec![1, 2, 3, 4]);
    assert_eq!(history.current_state, EntityState::Completed);
    assert_eq!(history.total_transitions, 4);
}

#[tokio::test]
async fn current_state_agrees_with_history() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    let entity_id = seeded_entity(&h, "ORD-1").await;

    assert!(h
        .state_tracking
        .get_entity_state_history(entity_id)
        .await
        .unwrap()
        .is_none());
    assert!(h
        .state_tracking
        .get_current_state(entity_id)
        .await
        .unwrap()
        .is_none());

    h.state_tracking
        .record_transition(NewStateTransition::new(
            entity_id,
            EntityState::Received,
            EntityState::Processing,
            "mapper",
        ))
        .await
        .unwrap();

    let history = h
        .state_tracking
        .get_entity_state_history(entity_id)
        .await
        .unwrap()
        .unwrap();
    let current = h
        .state_tracking
        .get_current_state(entity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        &current,
        history.transitions.last().unwrap().to_state(),
    );
}

#[tokio::test]
async fn transitions_for_unknown_entities_are_rejected() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let err = h
        .state_tracking
        .record_transition(NewStateTransition::new(
            EntityId::new(),
            EntityState::Received,
            EntityState::Processing,
            "mapper",
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConstraintViolation);
}

#[tokio::test]
async fn entities_in_state_uses_the_latest_transition() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let finished = seeded_entity(&h, "ORD-DONE").await;
    let in_flight = seeded_entity(&h, "ORD-OPEN").await;

    for (entity, chain) in [
        (
            finished,
            vec![
                (EntityState::Received, EntityState::Processing),
                (EntityState::Processing, EntityState::Completed),
            ],
        ),
        (in_flight, vec![(EntityState::Received, EntityState::Processing)]),
    ] {
        for (from, to) in chain {
            h.state_tracking
                .record_transition(NewStateTransition::new(entity, from, to, "pipeline"))
                .await
                .unwrap();
        }
    }

    let processing = h
        .state_tracking
        .get_entities_in_state(&EntityState::Processing, None, None)
        .await
        .unwrap();
    assert_eq!(processing, vec![in_flight]);

    // The finished entity passed through PROCESSING but is not in it
    let completed = h
        .state_tracking
        .get_entities_in_state(&EntityState::Completed, None, None)
        .await
        .unwrap();
    assert_eq!(completed, vec![finished]);
}

#[tokio::test]
async fn stuck_entities_respect_the_threshold() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    let entity_id = seeded_entity(&h, "ORD-1").await;

    h.state_tracking
        .record_transition(NewStateTransition::new(
            entity_id,
            EntityState::Received,
            EntityState::Processing,
            "mapper",
        ))
        .await
        .unwrap();

    // Threshold zero: anything recorded before "now" counts as stuck
    let stuck = h
        .state_tracking
        .get_stuck_entities(&EntityState::Processing, 0, None)
        .await
        .unwrap();
    assert_eq!(stuck, vec![entity_id]);

    // A generous threshold excludes the fresh transition
    let stuck = h
        .state_tracking
        .get_stuck_entities(&EntityState::Processing, 60, None)
        .await
        .unwrap();
    assert!(stuck.is_empty());
}

#[tokio::test]
async fn statistics_aggregate_the_window() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    let entity_id = seeded_entity(&h, "ORD-1").await;

    h.state_tracking
        .record_transition(
            NewStateTransition::new(
                entity_id,
                EntityState::Received,
                EntityState::Processing,
                "mapper",
            )
            .with_duration(100),
        )
        .await
        .unwrap();
    h.state_tracking
        .record_transition(
            NewStateTransition::new(
                entity_id,
                EntityState::Processing,
                EntityState::Completed,
                "mapper",
            )
            .with_duration(300),
        )
        .await
        .unwrap();
    h.state_tracking
        .record_transition(
            NewStateTransition::new(
                entity_id,
                EntityState::Completed,
                EntityState::SystemError,
                "deliverer",
            )
            .with_transition_type(TransitionType::Error),
        )
        .await
        .unwrap();

    let stats = h.state_tracking.get_state_statistics(None, None).await.unwrap();

    assert_eq!(stats.total_transitions, 3);
    assert_eq!(stats.transitions_by_state["PROCESSING"], 1);
    assert_eq!(stats.transitions_by_state["COMPLETED"], 1);
    assert_eq!(stats.transitions_by_state["SYSTEM_ERROR"], 1);
    assert!((stats.error_rate - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.most_common_error_states, vec!["SYSTEM_ERROR".to_string()]);
    // Durations group by origin state over measured rows only
    assert!((stats.avg_duration_by_state["RECEIVED"] - 100.0).abs() < 1e-9);
    assert!((stats.avg_duration_by_state["PROCESSING"] - 300.0).abs() < 1e-9);
    assert!(!stats.avg_duration_by_state.contains_key("COMPLETED"));
}

#[tokio::test]
async fn empty_window_yields_empty_statistics() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let stats = h.state_tracking.get_state_statistics(None, None).await.unwrap();
    assert_eq!(stats.total_transitions, 0);
    assert_eq!(stats.error_rate, 0.0);
    assert!(stats.most_common_error_states.is_empty());
}

#[tokio::test]
async fn avg_processing_time_covers_measured_rows_only() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    let entity_id = seeded_entity(&h, "ORD-1").await;

    for duration in [Some(100), Some(200), None] {
        let mut transition = NewStateTransition::new(
            entity_id,
            EntityState::Processing,
            EntityState::Completed,
            "mapper",
        );
        if let Some(duration) = duration {
            transition = transition.with_duration(duration);
        }
        h.state_tracking.record_transition(transition).await.unwrap();
    }

    let avg = h
        .state_tracking
        .calculate_avg_processing_time(&EntityState::Processing, &EntityState::Completed)
        .await
        .unwrap();
    assert_eq!(avg, Some(150.0));

    let missing = h
        .state_tracking
        .calculate_avg_processing_time(&EntityState::Received, &EntityState::Delivered)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn filter_queries_narrow_by_actor_and_type() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;
    let entity_id = seeded_entity(&h, "ORD-1").await;

    h.state_tracking
        .record_transition(NewStateTransition::new(
            entity_id,
            EntityState::Received,
            EntityState::Processing,
            "mapper",
        ))
        .await
        .unwrap();
    h.state_tracking
        .record_transition(
            NewStateTransition::new(
                entity_id,
                EntityState::Processing,
                EntityState::SystemError,
                "deliverer",
            )
            .with_transition_type(TransitionType::Error),
        )
        .await
        .unwrap();

    let filter = StateTransitionFilter {
        actor: Some("deliverer".to_string()),
        transition_type: Some(TransitionType::Error),
        ..Default::default()
    };
    let transitions = h
        .state_tracking
        .get_transitions(&filter, None, None)
        .await
        .unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].to_state(), &EntityState::SystemError);
}

#[tokio::test]
async fn message_annotation_tracks_state_changes() {
    let h = harness().await;
    h.seed_tenant("tenant-a").await;

    let message = common::order_message("tenant-a", "ORD-1", json_map(&[("a", json!(1))]));

    let annotated = h
        .state_tracking
        .update_message_with_state(&message, &EntityState::Validated);
    assert_eq!(annotated.metadata["current_state"], json!("VALIDATED"));
    assert!(annotated.metadata.contains_key("state_changed_at"));
    assert!(!annotated.metadata.contains_key("previous_state"));
    // The original is untouched
    assert!(!message.metadata.contains_key("current_state"));

    let twice = h
        .state_tracking
        .update_message_with_state(&annotated, &EntityState::Transformed);
    assert_eq!(twice.metadata["previous_state"], json!("VALIDATED"));
    assert_eq!(twice.metadata["current_state"], json!("TRANSFORMED"));
}
