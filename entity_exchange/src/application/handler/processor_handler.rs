// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Handler
//!
//! Wraps any user processor with the full framework: message validation,
//! entity persistence for canonicalizing source processors, state
//! transition recording, error capture, retry classification, and
//! exponential backoff - all under the message's tenant context.
//!
//! ## Execution Contract
//!
//! 1. Push the message's tenant onto the invocation context (restored when
//!    execution ends, even on panic).
//! 2. Non-source processors without an entity id fail fast with
//!    `MISSING_ENTITY_ID` and dead-letter routing; no ledger writes.
//! 3. With state tracking enabled and an entity id present, record
//!    RECEIVED -> PROCESSING.
//! 4. A failed `validate_message` returns `INVALID_MESSAGE`
//!    (`can_retry = false`), still recording the failure in both ledgers
//!    when the entity is known.
//! 5. Run the processor and measure its duration.
//! 6. On success: persist canonical content (source processors only; a
//!    persistence failure is logged and does **not** downgrade the result),
//!    record PROCESSING -> COMPLETED, stamp `processed_at`.
//! 7. On failure (returned or thrown): record the error and
//!    PROCESSING -> SYSTEM_ERROR, classify retryability, and attach the
//!    backoff delay.
//!
//! The handler never retries by itself; the retry budget belongs to the
//! message and requeueing belongs to the host. Ledger writes are
//! best-effort so ledger outages never cascade into processing outages.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use entity_exchange_domain::repositories::NewStateTransition;
use entity_exchange_domain::services::KEY_PROCESSOR_EXECUTION;
use entity_exchange_domain::{
    EntityId, EntityState, ErrorCode, ExchangeError, JsonMap, Message, Processor,
    ProcessorConfig, ProcessorResult, TenantContext, TransitionType,
};

use crate::application::services::{
    ProcessingErrorService, ProcessingService, StateTrackingService,
};

/// Exponential backoff: `min(2^retry_count, 300)` seconds.
pub fn retry_delay_seconds(retry_count: u32) -> u64 {
    2u64.saturating_pow(retry_count).min(300)
}

/// Unified handler for processor execution with full framework
/// integration.
pub struct ProcessorHandler {
    processor: Arc<dyn Processor>,
    config: ProcessorConfig,
    processing_service: Arc<ProcessingService>,
    state_tracking: Option<Arc<StateTrackingService>>,
    error_service: Option<Arc<ProcessingErrorService>>,
    context: TenantContext,
}

impl ProcessorHandler {
    pub fn new(
        processor: Arc<dyn Processor>,
        config: ProcessorConfig,
        processing_service: Arc<ProcessingService>,
        context: TenantContext,
    ) -> Self {
        ProcessorHandler {
            processor,
            config,
            processing_service,
            state_tracking: None,
            error_service: None,
            context,
        }
    }

    /// Injects the optional state tracking service.
    pub fn with_state_tracking(mut self, service: Arc<StateTrackingService>) -> Self {
        self.state_tracking = Some(service);
        self
    }

    /// Injects the optional error recording service.
    pub fn with_error_recording(mut self, service: Arc<ProcessingErrorService>) -> Self {
        self.error_service = Some(service);
        self
    }

    /// Executes the processor for one message under the message's tenant.
    pub async fn execute(&self, message: &mut Message) -> ProcessorResult {
        let started = Instant::now();

        let _scope = match self.context.push_tenant(&message.entity_reference.tenant_id) {
            Ok(scope) => scope,
            Err(err) => {
                return self.failure_result(
                    format!("Invalid tenant in message: {}", err),
                    ErrorCode::InvalidMessage,
                    false,
                    started,
                    message,
                );
            }
        };

        info!(
            processor = %self.config.processor_name,
            message_id = %message.message_id,
            correlation_id = %message.correlation_id,
            external_id = %message.entity_reference.external_id,
            source = %message.entity_reference.source,
            "Starting processor execution"
        );

        let entity_id = message
            .entity_reference
            .entity_id
            .as_deref()
            .and_then(|raw| EntityId::parse(raw).ok());

        // Non-source processors consume an existing entity by id.
        if !self.config.is_source_processor && entity_id.is_none() {
            return self
                .failure_result(
                    "Missing entity_id for non-source processor",
                    ErrorCode::MissingEntityId,
                    false,
                    started,
                    message,
                )
                .with_dead_letter("missing_entity_id");
        }

        if let Some(entity_id) = entity_id {
            let mut data = JsonMap::new();
            data.insert(
                "processor".to_string(),
                Value::String(self.config.processor_name.clone()),
            );
            self.record_transition_best_effort(
                NewStateTransition::new(
                    entity_id,
                    EntityState::Received,
                    EntityState::Processing,
                    &self.config.processor_name,
                )
                .with_processor_data(self.transition_data(data, message)),
            )
            .await;
        }

        if !self.processor.validate_message(message) {
            let result = self.failure_result(
                "Message validation failed",
                ErrorCode::InvalidMessage,
                false,
                started,
                message,
            );
            self.handle_processing_failure(&result, entity_id).await;
            return result;
        }

        match self.processor.process(message).await {
            Ok(mut result) => {
                result.processing_duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                result.processor_info = self.processor.processor_info();

                if result.success {
                    let mut effective_entity_id = entity_id;
                    if self.config.is_source_processor {
                        if let Some(persisted) = self.persist_entity(message, &mut result).await {
                            effective_entity_id = Some(persisted);
                        }
                    }

                    if let Some(entity_id) = effective_entity_id {
                        let mut data = JsonMap::new();
                        data.insert(
                            "processor".to_string(),
                            Value::String(self.config.processor_name.clone()),
                        );
                        data.insert(
                            "duration_ms".to_string(),
                            Value::from(result.processing_duration_ms),
                        );
                        self.record_transition_best_effort(
                            NewStateTransition::new(
                                entity_id,
                                EntityState::Processing,
                                EntityState::Completed,
                                &self.config.processor_name,
                            )
                            .with_processor_data(self.transition_data(data, message))
                            .with_duration(started.elapsed().as_millis() as i64),
                        )
                        .await;
                    }

                    message.mark_processed();

                    info!(
                        processor = %self.config.processor_name,
                        message_id = %message.message_id,
                        duration_ms = result.processing_duration_ms,
                        entities_created = result.entities_created.len(),
                        entities_updated = result.entities_updated.len(),
                        "Processor execution completed successfully"
                    );
                } else {
                    self.handle_processing_failure(&result, entity_id).await;
                }

                result
            }
            Err(err) => self.handle_thrown_error(err, message, started, entity_id).await,
        }
    }

    /// Compatibility shim for transports that serialize messages to untyped
    /// maps. Converts through the typed form exactly once each way.
    pub async fn handle_message(&self, message: Value) -> Result<Value, ExchangeError> {
        let mut message = Message::from_value(message)?;
        let result = self.execute(&mut message).await;

        let mut output = serde_json::to_value(&result)
            .map_err(|e| ExchangeError::unexpected(format!("Result serialization failed: {}", e)))?;
        if let Value::Object(map) = &mut output {
            map.insert(
                "original_message_id".to_string(),
                Value::String(message.message_id.clone()),
            );
            map.insert(
                "correlation_id".to_string(),
                Value::String(message.correlation_id.clone()),
            );
        }
        Ok(output)
    }

    /// Persists canonical content through the processing service. Returns
    /// the persisted entity id, or `None` when the processor does not
    /// canonicalize or persistence failed (logged, never fatal).
    async fn persist_entity(
        &self,
        message: &Message,
        result: &mut ProcessorResult,
    ) -> Option<EntityId> {
        let canonical = match self
            .processor
            .to_canonical(&message.payload, &message.metadata)?
        {
            Ok(canonical) => canonical,
            Err(err) => {
                error!(
                    processor = %self.config.processor_name,
                    message_id = %message.message_id,
                    error = %err,
                    "Canonical transformation failed"
                );
                return None;
            }
        };

        let mut execution = JsonMap::new();
        execution.insert(
            "message_id".to_string(),
            Value::String(message.message_id.clone()),
        );
        execution.insert(
            "correlation_id".to_string(),
            Value::String(message.correlation_id.clone()),
        );
        execution.insert(
            "processing_duration_ms".to_string(),
            Value::from(result.processing_duration_ms),
        );
        let mut custom_attributes = JsonMap::new();
        custom_attributes.insert(KEY_PROCESSOR_EXECUTION.to_string(), Value::Object(execution));

        match self
            .processing_service
            .process_entity(
                &message.entity_reference.external_id,
                &message.entity_reference.canonical_type,
                &message.entity_reference.source,
                &canonical,
                &self.config,
                Some(custom_attributes),
                Some(message.metadata.clone()),
            )
            .await
        {
            Ok(outcome) => {
                let entity_id = outcome.entity_id.to_string();
                if outcome.is_new_entity {
                    result.entities_created.push(entity_id.clone());
                } else {
                    result.entities_updated.push(entity_id.clone());
                }
                result
                    .processing_metadata
                    .insert("entity_id".to_string(), Value::String(entity_id));
                result.processing_metadata.insert(
                    "entity_version".to_string(),
                    Value::from(outcome.entity_version),
                );
                result.processing_metadata.insert(
                    "content_changed".to_string(),
                    Value::Bool(outcome.content_changed),
                );
                result
                    .processing_metadata
                    .insert("is_new_entity".to_string(), Value::Bool(outcome.is_new_entity));

                Some(outcome.entity_id)
            }
            Err(err) => {
                // The processor already succeeded; a persistence failure is
                // logged but does not downgrade the result.
                error!(
                    processor = %self.config.processor_name,
                    message_id = %message.message_id,
                    error = %err,
                    "Entity persistence failed"
                );
                None
            }
        }
    }

    /// Classifies a thrown error into a failure result.
    async fn handle_thrown_error(
        &self,
        err: ExchangeError,
        message: &Message,
        started: Instant,
        entity_id: Option<EntityId>,
    ) -> ProcessorResult {
        let result = match &err {
            ExchangeError::Validation(validation) => {
                warn!(
                    processor = %self.config.processor_name,
                    message_id = %message.message_id,
                    error = %validation,
                    "Validation error in processor"
                );
                let mut result = self.failure_result(
                    format!("Validation error: {}", validation),
                    ErrorCode::ValidationError,
                    false,
                    started,
                    message,
                );
                if let Some(field) = &validation.field {
                    result = result
                        .with_error_detail("field", Value::String(field.clone()));
                }
                result.with_error_detail(
                    "validation_code",
                    Value::String(validation.code.to_string()),
                )
            }
            ExchangeError::Service(_) | ExchangeError::Repository(_) => {
                let can_retry = self.processor.can_retry(&err);
                error!(
                    processor = %self.config.processor_name,
                    message_id = %message.message_id,
                    error = %err,
                    error_code = %err.code(),
                    can_retry,
                    "Service error in processor"
                );
                self.failure_result(
                    format!("Service error: {}", err),
                    ErrorCode::ServiceError,
                    can_retry,
                    started,
                    message,
                )
                .with_retry_after(retry_delay_seconds(message.retry_count))
                .with_error_detail(
                    "service_error_code",
                    Value::String(err.code().to_string()),
                )
            }
            ExchangeError::Unexpected(detail) => {
                let can_retry = self.processor.can_retry(&err);
                error!(
                    processor = %self.config.processor_name,
                    message_id = %message.message_id,
                    error = %detail,
                    can_retry,
                    "Unexpected error in processor"
                );
                self.failure_result(
                    format!("Unexpected error: {}", detail),
                    ErrorCode::UnexpectedError,
                    can_retry,
                    started,
                    message,
                )
                .with_retry_after(retry_delay_seconds(message.retry_count))
                .with_error_detail("error_details", Value::String(detail.clone()))
            }
        };

        self.handle_processing_failure(&result, entity_id).await;
        result
    }

    /// Records a failure in the error ledger and the state ledger. Both
    /// writes are best-effort.
    async fn handle_processing_failure(
        &self,
        result: &ProcessorResult,
        entity_id: Option<EntityId>,
    ) {
        let Some(entity_id) = entity_id else {
            // Pre-persistence failures cannot be recorded in the ledgers;
            // the error ledger requires an entity row.
            return;
        };

        if let Some(error_service) = &self.error_service {
            let error_code = result
                .error_code
                .unwrap_or(ErrorCode::ProcessingFailure)
                .to_string();
            let error_message = result
                .error_message
                .clone()
                .unwrap_or_else(|| "Processing failed".to_string());
            if let Err(err) = error_service
                .record_error(
                    entity_id,
                    &error_code,
                    &error_message,
                    &self.config.processor_name,
                    None,
                )
                .await
            {
                warn!(error = %err, "Failed to record processing error");
            }
        }

        let mut data = JsonMap::new();
        data.insert(
            "processor".to_string(),
            Value::String(self.config.processor_name.clone()),
        );
        data.insert(
            "error_code".to_string(),
            result
                .error_code
                .map(|code| Value::String(code.to_string()))
                .unwrap_or(Value::Null),
        );
        data.insert(
            "error_message".to_string(),
            result
                .error_message
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        self.record_transition_best_effort(
            NewStateTransition::new(
                entity_id,
                EntityState::Processing,
                EntityState::SystemError,
                &self.config.processor_name,
            )
            .with_transition_type(TransitionType::Error)
            .with_processor_data(data),
        )
        .await;
    }

    /// Records a transition when tracking is enabled; failures are logged
    /// and swallowed.
    async fn record_transition_best_effort(&self, transition: NewStateTransition) {
        if !self.config.enable_state_tracking {
            return;
        }
        let Some(state_tracking) = &self.state_tracking else {
            return;
        };

        if let Err(err) = state_tracking.record_transition(transition).await {
            warn!(error = %err, "Failed to record state transition");
        }
    }

    /// Stamps processor identity and message context onto transition data.
    fn transition_data(&self, mut data: JsonMap, message: &Message) -> JsonMap {
        data.insert(
            "processor_name".to_string(),
            Value::String(self.config.processor_name.clone()),
        );
        data.insert(
            "processor_version".to_string(),
            Value::String(self.config.processor_version.clone()),
        );
        data.insert(
            "message_id".to_string(),
            Value::String(message.message_id.clone()),
        );
        data.insert(
            "correlation_id".to_string(),
            Value::String(message.correlation_id.clone()),
        );
        data
    }

    /// Builds a failure result with consistent duration and routing.
    fn failure_result(
        &self,
        error_message: impl Into<String>,
        error_code: ErrorCode,
        can_retry: bool,
        started: Instant,
        message: &Message,
    ) -> ProcessorResult {
        let mut result = ProcessorResult::failure(error_message, error_code, can_retry);
        result.processing_duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        result.routing_info = message.routing_info.clone();
        result.processor_info = self.processor.processor_info();
        result
    }
}
