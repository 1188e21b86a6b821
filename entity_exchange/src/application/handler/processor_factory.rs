// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Factory
//!
//! Wires a processor and its configuration into a fully configured
//! [`ProcessorHandler`] against a shared pool: repositories, entity and
//! detection services, the processing orchestrator, and both ledgers, all
//! bound to one invocation's tenant context.
//!
//! Hosts typically build one factory per invocation (cheap - everything
//! holds pool clones) and one handler per processor.

use std::sync::Arc;

use sqlx::SqlitePool;

use entity_exchange_domain::{Processor, ProcessorConfig, TenantContext};

use crate::application::handler::ProcessorHandler;
use crate::application::services::{
    DuplicateDetectionService, EntityService, ProcessingErrorService, ProcessingService,
    StateTrackingService,
};
use crate::infrastructure::repositories::{
    SqliteEntityRepository, SqliteProcessingErrorRepository, SqliteStateTransitionRepository,
};

/// Builds fully wired processor handlers.
pub struct ProcessorFactory {
    pool: SqlitePool,
    context: TenantContext,
}

impl ProcessorFactory {
    pub fn new(pool: SqlitePool, context: TenantContext) -> Self {
        ProcessorFactory { pool, context }
    }

    /// Returns the tenant context this factory wires into services.
    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    /// Builds the entity service against the shared pool.
    pub fn entity_service(&self) -> Arc<EntityService> {
        let repository = Arc::new(SqliteEntityRepository::new(
            self.pool.clone(),
            self.context.clone(),
        ));
        Arc::new(EntityService::new(repository, self.context.clone()))
    }

    /// Builds the state tracking service against the shared pool.
    pub fn state_tracking_service(&self) -> Arc<StateTrackingService> {
        let repository = Arc::new(SqliteStateTransitionRepository::new(
            self.pool.clone(),
            self.context.clone(),
        ));
        Arc::new(StateTrackingService::new(repository, self.context.clone()))
    }

    /// Builds the error recording service against the shared pool.
    pub fn processing_error_service(&self) -> Arc<ProcessingErrorService> {
        let repository = Arc::new(SqliteProcessingErrorRepository::new(
            self.pool.clone(),
            self.context.clone(),
        ));
        Arc::new(ProcessingErrorService::new(
            repository,
            self.context.clone(),
        ))
    }

    /// Wires a processor into a handler with persistence, state tracking
    /// and error recording attached.
    pub fn create_handler(
        &self,
        processor: Arc<dyn Processor>,
        config: ProcessorConfig,
    ) -> ProcessorHandler {
        let entity_repository = Arc::new(SqliteEntityRepository::new(
            self.pool.clone(),
            self.context.clone(),
        ));
        let entity_service = Arc::new(EntityService::new(
            entity_repository.clone(),
            self.context.clone(),
        ));
        let duplicate_detection = Arc::new(DuplicateDetectionService::new(
            entity_repository,
            self.context.clone(),
        ));
        let state_tracking = self.state_tracking_service();
        let error_service = self.processing_error_service();

        let processing_service = Arc::new(
            ProcessingService::new(entity_service, duplicate_detection, self.context.clone())
                .with_state_tracking(state_tracking.clone())
                .with_error_recording(error_service.clone()),
        );

        ProcessorHandler::new(processor, config, processing_service, self.context.clone())
            .with_state_tracking(state_tracking)
            .with_error_recording(error_service)
    }
}
