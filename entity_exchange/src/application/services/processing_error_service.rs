// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processing Error Service
//!
//! Records processing failures with full context so operators can find
//! them, and supports filtered queries and batch cleanup by entity.

use std::sync::Arc;

use tracing::debug;

use entity_exchange_domain::repositories::{
    NewProcessingError, ProcessingErrorFilter, ProcessingErrorRepository,
};
use entity_exchange_domain::{
    EntityId, ErrorId, ProcessingError, RepositoryError, ServiceError, TenantContext,
};

use crate::application::context::Operation;

/// Service over the processing error ledger.
pub struct ProcessingErrorService {
    repository: Arc<dyn ProcessingErrorRepository>,
    context: TenantContext,
}

impl ProcessingErrorService {
    pub fn new(repository: Arc<dyn ProcessingErrorRepository>, context: TenantContext) -> Self {
        ProcessingErrorService {
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

    /// Records a processing error for an entity.
    pub async fn record_error(
        &self,
        entity_id: EntityId,
        error_type_code: &str,
        message: &str,
        processing_step: &str,
        stack_trace: Option<String>,
    ) -> Result<ErrorId, ServiceError> {
        let mut op = Operation::start("record_processing_error", &self.context);

        let new_error = NewProcessingError::new(entity_id, error_type_code, message, processing_step);
        let new_error = match stack_trace {
            Some(trace) => new_error.with_stack_trace(trace),
            None => new_error,
        };

        self.repository
            .record(new_error)
            .await
            .map_err(|e| self.service_error("record_error", e).for_entity(entity_id.to_string()))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Returns every error recorded for an entity, newest first.
    pub async fn find_by_entity_id(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<ProcessingError>, ServiceError> {
        let mut op = Operation::start("find_errors_by_entity", &self.context);
        self.repository
            .find_by_entity_id(entity_id)
            .await
            .map_err(|e| self.service_error("find_by_entity_id", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Returns errors matching the filter, newest first.
    pub async fn get_by_filter(
        &self,
        filter: &ProcessingErrorFilter,
    ) -> Result<Vec<ProcessingError>, ServiceError> {
        let mut op = Operation::start("get_errors_by_filter", &self.context);
        self.repository
            .get_by_filter(filter)
            .await
            .map_err(|e| self.service_error("get_by_filter", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Deletes one error record.
    pub async fn delete(&self, id: ErrorId) -> Result<bool, ServiceError> {
        let mut op = Operation::start("delete_processing_error", &self.context);
        self.repository
            .delete(id)
            .await
            .map_err(|e| self.service_error("delete", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Deletes every error recorded for an entity, returning the count.
    pub async fn delete_by_entity_id(&self, entity_id: EntityId) -> Result<u64, ServiceError> {
        let mut op = Operation::start("delete_errors_by_entity", &self.context);
        let deleted = self
            .repository
            .delete_by_entity_id(entity_id)
            .await
            .map_err(|e| self.service_error("delete_by_entity_id", e))
            .inspect_err(|err| op.fail(err.code))?;

        debug!(entity_id = %entity_id, deleted, "Deleted processing errors for entity");
        Ok(deleted)
    }
}
