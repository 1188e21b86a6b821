// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for the processing error ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::ProcessingError;
use crate::error::RepositoryError;
use crate::value_objects::{EntityId, ErrorId};

/// Data for recording a processing error.
#[derive(Debug, Clone)]
pub struct NewProcessingError {
    pub entity_id: EntityId,
    pub error_type_code: String,
    pub message: String,
    pub processing_step: String,
    pub stack_trace: Option<String>,
}

impl NewProcessingError {
    pub fn new(
        entity_id: EntityId,
        error_type_code: impl Into<String>,
        message: impl Into<String>,
        processing_step: impl Into<String>,
    ) -> Self {
        NewProcessingError {
            entity_id,
            error_type_code: error_type_code.into(),
            message: message.into(),
            processing_step: processing_step.into(),
            stack_trace: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

/// Filter criteria for error queries. Conjunctive; `None` means "no
/// constraint".
#[derive(Debug, Clone, Default)]
pub struct ProcessingErrorFilter {
    pub entity_id: Option<EntityId>,
    pub error_type_code: Option<String>,
    pub processing_step: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Persistence port for processing errors.
#[async_trait]
pub trait ProcessingErrorRepository: Send + Sync {
    /// Records an error, returning its id. Fails with
    /// `CONSTRAINT_VIOLATION` when the entity does not exist.
    async fn record(&self, new: NewProcessingError) -> Result<ErrorId, RepositoryError>;

    /// Returns every error recorded for an entity, newest first.
    async fn find_by_entity_id(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<ProcessingError>, RepositoryError>;

    /// Returns errors matching the filter, newest first.
    async fn get_by_filter(
        &self,
        filter: &ProcessingErrorFilter,
    ) -> Result<Vec<ProcessingError>, RepositoryError>;

    /// Deletes one error record. Returns `false` when nothing was deleted.
    async fn delete(&self, id: ErrorId) -> Result<bool, RepositoryError>;

    /// Deletes every error recorded for an entity, returning the count.
    async fn delete_by_entity_id(&self, entity_id: EntityId) -> Result<u64, RepositoryError>;
}
