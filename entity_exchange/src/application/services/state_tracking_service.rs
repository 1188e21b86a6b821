// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # State Tracking Service
//!
//! Records entity state transitions and answers derived questions over the
//! ledger: the current state of an entity, its full ordered history, which
//! entities sit in a state, which of those are stuck, and aggregate
//! statistics for a time window.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use entity_exchange_domain::repositories::{
    NewStateTransition, StateTransitionFilter, StateTransitionRepository,
};
use entity_exchange_domain::{
    EntityId, EntityState, Message, RepositoryError, ServiceError, StateTransition,
    TenantContext, TransitionId, TransitionType,
};

use crate::application::context::Operation;

/// Complete ordered state history of one entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityStateHistory {
    pub entity_id: EntityId,
    pub current_state: EntityState,
    #[serde(skip)]
    pub transitions: Vec<StateTransition>,
    pub total_transitions: usize,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Sum of recorded transition durations, in milliseconds.
    pub total_processing_time: i64,
}

/// Aggregate transition statistics for a time window.
#[derive(Debug, Clone, Serialize)]
pub struct StateTransitionStats {
    pub total_transitions: usize,
    /// Transition counts keyed by target state label.
    pub transitions_by_state: HashMap<String, usize>,
    /// Average recorded duration keyed by origin state label, over rows
    /// with a duration only.
    pub avg_duration_by_state: HashMap<String, f64>,
    /// Share of transitions with type `ERROR`.
    pub error_rate: f64,
    /// Up to five most common target states among `ERROR` transitions.
    pub most_common_error_states: Vec<String>,
}

impl StateTransitionStats {
    fn empty() -> Self {
        StateTransitionStats {
            total_transitions: 0,
            transitions_by_state: HashMap::new(),
            avg_duration_by_state: HashMap::new(),
            error_rate: 0.0,
            most_common_error_states: Vec::new(),
        }
    }
}

/// Service for the append-only state-transition ledger.
pub struct StateTrackingService {
    repository: Arc<dyn StateTransitionRepository>,
    context: TenantContext,
}

impl StateTrackingService {
    pub fn new(repository: Arc<dyn StateTransitionRepository>, context: TenantContext) -> Self {
        StateTrackingService {
            repository,
            context,
        }
    }

    fn service_error(&self, operation: &'static str, err: RepositoryError) -> ServiceError {
        let mut converted = ServiceError::from_repository(operation, err);
        if converted.tenant_id.is_none() {
            converted.tenant_id = self.context.current_tenant_id();
        }
        converted
    }

    /// Appends a transition to the ledger.
    pub async fn record_transition(
        &self,
        new: NewStateTransition,
    ) -> Result<TransitionId, ServiceError> {
        let mut op = Operation::start("record_state_transition", &self.context);
        let entity_id = new.entity_id;
        self.repository
            .record(new)
            .await
            .map_err(|e| self.service_error("record_transition", e).for_entity(entity_id.to_string()))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Returns the complete state history of an entity, or `None` when no
    /// transition has been recorded.
    pub async fn get_entity_state_history(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<EntityStateHistory>, ServiceError> {
        let mut op = Operation::start("get_entity_state_history", &self.context);

        let transitions = self
            .repository
            .get_for_entity(entity_id)
            .await
            .map_err(|e| self.service_error("get_entity_state_history", e))
            .inspect_err(|err| op.fail(err.code))?;

        let (Some(first), Some(last)) = (transitions.first(), transitions.last()) else {
            return Ok(None);
        };

        let total_processing_time = transitions
            .iter()
            .filter_map(StateTransition::transition_duration)
            .sum();

        Ok(Some(EntityStateHistory {
            entity_id,
            current_state: last.to_state().clone(),
            total_transitions: transitions.len(),
            first_seen: first.created_at(),
            last_updated: last.created_at(),
            total_processing_time,
            transitions,
        }))
    }

    /// Returns the current state of an entity: the `to_state` of its most
    /// recent transition.
    pub async fn get_current_state(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<EntityState>, ServiceError> {
        let history = self.get_entity_state_history(entity_id).await?;
        Ok(history.map(|h| h.current_state))
    }

    /// Returns ids of entities currently in the given state.
    pub async fn get_entities_in_state(
        &self,
        state: &EntityState,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<EntityId>, ServiceError> {
        let mut op = Operation::start("get_entities_in_state", &self.context);
        self.repository
            .entities_in_state(state, limit, offset)
            .await
            .map_err(|e| self.service_error("get_entities_in_state", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Returns ids of entities sitting in the given state for longer than
    /// the threshold.
    pub async fn get_stuck_entities(
        &self,
        state: &EntityState,
        threshold_minutes: i64,
        limit: Option<i64>,
    ) -> Result<Vec<EntityId>, ServiceError> {
        let mut op = Operation::start("get_stuck_entities", &self.context);

        let cutoff = Utc::now() - Duration::minutes(threshold_minutes);
        self.repository
            .entities_stuck_in_state(state, cutoff, limit)
            .await
            .map_err(|e| self.service_error("get_stuck_entities", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Returns transitions matching a filter.
    pub async fn get_transitions(
        &self,
        filter: &StateTransitionFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<StateTransition>, ServiceError> {
        let mut op = Operation::start("get_transitions", &self.context);
        self.repository
            .get_by_filter(filter, limit, offset)
            .await
            .map_err(|e| self.service_error("get_transitions", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Computes aggregate statistics over an optional time window.
    pub async fn get_state_statistics(
        &self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<StateTransitionStats, ServiceError> {
        let mut op = Operation::start("get_state_statistics", &self.context);

        let filter = StateTransitionFilter {
            created_after: start_time,
            created_before: end_time,
            ..Default::default()
        };
        let transitions = self
            .repository
            .get_by_filter(&filter, None, None)
            .await
            .map_err(|e| self.service_error("get_state_statistics", e))
            .inspect_err(|err| op.fail(err.code))?;

        if transitions.is_empty() {
            return Ok(StateTransitionStats::empty());
        }

        let total_transitions = transitions.len();

        let mut transitions_by_state: HashMap<String, usize> = HashMap::new();
        for t in &transitions {
            *transitions_by_state
                .entry(t.to_state().as_str().to_string())
                .or_insert(0) += 1;
        }

        // Average duration grouped by origin state, over measured rows only.
        let mut duration_sums: HashMap<String, (i64, usize)> = HashMap::new();
        for t in &transitions {
            if let Some(duration) = t.transition_duration() {
                let entry = duration_sums
                    .entry(t.from_state().as_str().to_string())
                    .or_insert((0, 0));
                entry.0 += duration;
                entry.1 += 1;
            }
        }
        let avg_duration_by_state = duration_sums
            .into_iter()
            .map(|(state, (sum, count))| (state, sum as f64 / count as f64))
            .collect();

        let error_transitions: Vec<_> = transitions
            .iter()
            .filter(|t| t.transition_type() == TransitionType::Error)
            .collect();
        let error_rate = error_transitions.len() as f64 / total_transitions as f64;

        let mut error_states: HashMap<String, usize> = HashMap::new();
        for t in &error_transitions {
            *error_states
                .entry(t.to_state().as_str().to_string())
                .or_insert(0) += 1;
        }
        let mut most_common_error_states: Vec<(String, usize)> =
            error_states.into_iter().collect();
        most_common_error_states.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let most_common_error_states = most_common_error_states
            .into_iter()
            .take(5)
            .map(|(state, _)| state)
            .collect();

        debug!(total_transitions, error_rate, "Computed state statistics");

        Ok(StateTransitionStats {
            total_transitions,
            transitions_by_state,
            avg_duration_by_state,
            error_rate,
            most_common_error_states,
        })
    }

    /// Computes the average recorded duration of transitions from
    /// `start_state` to `end_state`, or `None` when no measured transition
    /// matches.
    pub async fn calculate_avg_processing_time(
        &self,
        start_state: &EntityState,
        end_state: &EntityState,
    ) -> Result<Option<f64>, ServiceError> {
        let mut op = Operation::start("calculate_avg_processing_time", &self.context);

        let filter = StateTransitionFilter {
            from_state: Some(start_state.clone()),
            to_state: Some(end_state.clone()),
            ..Default::default()
        };
        let transitions = self
            .repository
            .get_by_filter(&filter, None, None)
            .await
            .map_err(|e| self.service_error("calculate_avg_processing_time", e))
            .inspect_err(|err| op.fail(err.code))?;

        let durations: Vec<i64> = transitions
            .iter()
            .filter_map(StateTransition::transition_duration)
            .collect();

        if durations.is_empty() {
            return Ok(None);
        }

        let total: i64 = durations.iter().sum();
        Ok(Some(total as f64 / durations.len() as f64))
    }

    /// Pure helper: returns a copy of a message annotated with state
    /// tracking metadata (`previous_state`, `current_state`,
    /// `state_changed_at`).
    pub fn update_message_with_state(&self, message: &Message, state: &EntityState) -> Message {
        let mut updated = message.clone();

        let previous_state = updated.metadata.get("current_state").cloned();
        if let Some(previous) = previous_state {
            updated.add_metadata("previous_state", previous);
        }
        updated.add_metadata(
            "current_state",
            serde_json::Value::String(state.as_str().to_string()),
        );
        updated.add_metadata(
            "state_changed_at",
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );

        updated
    }
}
