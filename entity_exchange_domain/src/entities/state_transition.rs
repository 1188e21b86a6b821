// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # State Transition
//!
//! One append-only row in the per-entity state ledger. Transitions are never
//! updated or deleted except by cascade with their entity or tenant, and are
//! totally ordered per entity by `sequence_number` (unique per entity,
//! starting at 1, no gaps).

use chrono::{DateTime, Utc};

use crate::value_objects::{EntityId, EntityState, TransitionId, TransitionType};
use crate::JsonMap;

/// Immutable record of a single state change of an entity.
#[derive(Debug, Clone)]
pub struct StateTransition {
    // Identity fields
    id: TransitionId,
    entity_id: EntityId,
    tenant_id: String,

    // Core business fields
    from_state: EntityState,
    to_state: EntityState,
    actor: String,
    transition_type: TransitionType,
    processor_data: JsonMap,
    queue_source: Option<String>,
    queue_destination: Option<String>,
    /// Duration of the previous state in milliseconds, when measured.
    transition_duration: Option<i64>,
    sequence_number: i64,
    notes: Option<String>,

    // Metadata fields
    created_at: DateTime<Utc>,
}

impl StateTransition {
    /// Rehydrates a transition from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: TransitionId,
        entity_id: EntityId,
        tenant_id: String,
        from_state: EntityState,
        to_state: EntityState,
        actor: String,
        transition_type: TransitionType,
        processor_data: JsonMap,
        queue_source: Option<String>,
        queue_destination: Option<String>,
        transition_duration: Option<i64>,
        sequence_number: i64,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        StateTransition {
            id,
            entity_id,
            tenant_id,
            from_state,
            to_state,
            actor,
            transition_type,
            processor_data,
            queue_source,
            queue_destination,
            transition_duration,
            sequence_number,
            notes,
            created_at,
        }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn from_state(&self) -> &EntityState {
        &self.from_state
    }

    pub fn to_state(&self) -> &EntityState {
        &self.to_state
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn transition_type(&self) -> TransitionType {
        self.transition_type
    }

    pub fn processor_data(&self) -> &JsonMap {
        &self.processor_data
    }

    pub fn queue_source(&self) -> Option<&str> {
        self.queue_source.as_deref()
    }

    pub fn queue_destination(&self) -> Option<&str> {
        self.queue_destination.as_deref()
    }

    pub fn transition_duration(&self) -> Option<i64> {
        self.transition_duration
    }

    pub fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
