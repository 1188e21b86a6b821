// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Diagnostic record of a processing failure, tied to an entity.

use chrono::{DateTime, Utc};

use crate::value_objects::{EntityId, ErrorId};

/// One recorded processing failure.
#[derive(Debug, Clone)]
pub struct ProcessingError {
    // Identity fields
    id: ErrorId,
    entity_id: EntityId,
    tenant_id: String,

    // Core business fields
    error_type_code: String,
    message: String,
    processing_step: String,
    stack_trace: Option<String>,

    // Metadata fields
    created_at: DateTime<Utc>,
}

impl ProcessingError {
    /// Rehydrates an error record from stored fields.
    pub fn from_parts(
        id: ErrorId,
        entity_id: EntityId,
        tenant_id: String,
        error_type_code: String,
        message: String,
        processing_step: String,
        stack_trace: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        ProcessingError {
            id,
            entity_id,
            tenant_id,
            error_type_code,
            message,
            processing_step,
            stack_trace,
            created_at,
        }
    }

    pub fn id(&self) -> ErrorId {
        self.id
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn error_type_code(&self) -> &str {
        &self.error_type_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn processing_step(&self) -> &str {
        &self.processing_step
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
