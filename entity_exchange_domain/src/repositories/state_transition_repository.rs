// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # State Transition Repository Port
//!
//! Append-only persistence contract for the state ledger. Implementations
//! must assign per-entity monotonic sequence numbers and enforce uniqueness
//! of `(entity_id, sequence_number)` at the storage layer, so that
//! concurrent writers to the same entity serialize at the constraint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::StateTransition;
use crate::error::RepositoryError;
use crate::value_objects::{EntityId, EntityState, TransitionId, TransitionType};
use crate::JsonMap;

/// Data for appending a transition to the ledger.
#[derive(Debug, Clone)]
pub struct NewStateTransition {
    pub entity_id: EntityId,
    pub from_state: EntityState,
    pub to_state: EntityState,
    /// Processor or user performing the transition.
    pub actor: String,
    pub transition_type: TransitionType,
    pub processor_data: JsonMap,
    pub queue_source: Option<String>,
    pub queue_destination: Option<String>,
    /// Duration of the previous state in milliseconds.
    pub transition_duration: Option<i64>,
    pub notes: Option<String>,
}

impl NewStateTransition {
    pub fn new(
        entity_id: EntityId,
        from_state: EntityState,
        to_state: EntityState,
        actor: impl Into<String>,
    ) -> Self {
        NewStateTransition {
            entity_id,
            from_state,
            to_state,
            actor: actor.into(),
            transition_type: TransitionType::Normal,
            processor_data: JsonMap::new(),
            queue_source: None,
            queue_destination: None,
            transition_duration: None,
            notes: None,
        }
    }

    pub fn with_transition_type(mut self, transition_type: TransitionType) -> Self {
        self.transition_type = transition_type;
        self
    }

    pub fn with_processor_data(mut self, processor_data: JsonMap) -> Self {
        self.processor_data = processor_data;
        self
    }

    pub fn with_queues(
        mut self,
        queue_source: Option<String>,
        queue_destination: Option<String>,
    ) -> Self {
        self.queue_source = queue_source;
        self.queue_destination = queue_destination;
        self
    }

    pub fn with_duration(mut self, transition_duration: i64) -> Self {
        self.transition_duration = Some(transition_duration);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Filter criteria for ledger queries. Conjunctive; `None` means "no
/// constraint".
#[derive(Debug, Clone, Default)]
pub struct StateTransitionFilter {
    pub entity_id: Option<EntityId>,
    pub from_state: Option<EntityState>,
    pub to_state: Option<EntityState>,
    pub transition_type: Option<TransitionType>,
    pub actor: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Persistence port for the append-only state ledger.
#[async_trait]
pub trait StateTransitionRepository: Send + Sync {
    /// Appends a transition, assigning the next sequence number for the
    /// entity. Fails with `CONSTRAINT_VIOLATION` when the entity does not
    /// exist and `DUPLICATE` when a concurrent writer took the sequence
    /// number first.
    async fn record(&self, new: NewStateTransition) -> Result<TransitionId, RepositoryError>;

    /// Returns every transition for an entity, ordered by sequence number.
    async fn get_for_entity(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<StateTransition>, RepositoryError>;

    /// Returns transitions matching the filter, ordered by creation time,
    /// then sequence number.
    async fn get_by_filter(
        &self,
        filter: &StateTransitionFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<StateTransition>, RepositoryError>;

    /// Returns ids of entities whose most recent transition landed in the
    /// given state.
    async fn entities_in_state(
        &self,
        state: &EntityState,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<EntityId>, RepositoryError>;

    /// Returns ids of entities whose most recent transition landed in the
    /// given state before the cutoff.
    async fn entities_stuck_in_state(
        &self,
        state: &EntityState,
        cutoff: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<EntityId>, RepositoryError>;
}
