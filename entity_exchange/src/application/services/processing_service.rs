// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processing Service
//!
//! Orchestrates the entity write path: duplicate detection, entity creation
//! or versioning, attribute building, and state-transition recording,
//! driven by the processor configuration.
//!
//! ## Decision Matrix
//!
//! | Processor  | Existing entity? | Action                                        |
//! |------------|------------------|-----------------------------------------------|
//! | source     | none             | create v1, record RECEIVED -> PROCESSING      |
//! | source     | exists           | create v+1, record PROCESSING -> PROCESSING   |
//! | non-source | none             | fail `NOT_FOUND`                              |
//! | non-source | exists           | merge attributes when configured, keep version|
//!
//! ## Failure Policy
//!
//! Duplicate detection failures degrade to a `DETECTION_FAILED` result
//! unless the configuration asks to fail closed. Ledger writes are
//! best-effort: a failure to record a transition is logged at warning and
//! never fails the write path.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use entity_exchange_domain::repositories::NewStateTransition;
use entity_exchange_domain::services::KEY_DUPLICATE_DETECTION;
use entity_exchange_domain::{
    DuplicateDetectionResult, EntityAttributeBuilder, EntityId, EntityState, ErrorCode,
    ExchangeError, JsonMap, ProcessorConfig, TenantContext, ValidationError,
};

use crate::application::context::Operation;
use crate::application::services::{
    DuplicateDetectionService, EntityService, ProcessingErrorService, StateTrackingService,
};

/// Result of one entity write-path pass.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub entity_id: EntityId,
    pub entity_version: i64,
    pub external_id: String,
    /// Whether content changed from the previous version.
    pub content_changed: bool,
    /// Whether this pass created a completely new entity.
    pub is_new_entity: bool,
    pub duplicate_detection: Option<DuplicateDetectionResult>,
    pub processing_metadata: JsonMap,
}

/// Orchestrator for the entity write path.
pub struct ProcessingService {
    entity_service: Arc<EntityService>,
    duplicate_detection: Arc<DuplicateDetectionService>,
    attribute_builder: EntityAttributeBuilder,
    context: TenantContext,
    state_tracking: Option<Arc<StateTrackingService>>,
    error_service: Option<Arc<ProcessingErrorService>>,
}

impl ProcessingService {
    pub fn new(
        entity_service: Arc<EntityService>,
        duplicate_detection: Arc<DuplicateDetectionService>,
        context: TenantContext,
    ) -> Self {
        ProcessingService {
            entity_service,
            duplicate_detection,
            attribute_builder: EntityAttributeBuilder::new(),
            context,
            state_tracking: None,
            error_service: None,
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

    /// Returns the injected error service, when present. The handler reuses
    /// it for ledger writes.
    pub fn error_service(&self) -> Option<Arc<ProcessingErrorService>> {
        self.error_service.clone()
    }

    /// Processes an entity through the complete write path.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_entity(
        &self,
        external_id: &str,
        canonical_type: &str,
        source: &str,
        content: &Value,
        config: &ProcessorConfig,
        custom_attributes: Option<JsonMap>,
        source_metadata: Option<JsonMap>,
    ) -> Result<ProcessingOutcome, ExchangeError> {
        let mut op = Operation::start("processing_service_process_entity", &self.context);

        info!(
            external_id,
            canonical_type,
            source,
            processor = %config.processor_name,
            is_source = config.is_source_processor,
            "Processing entity"
        );

        let duplicate_result = if config.enable_duplicate_detection {
            Some(
                self.perform_duplicate_detection(content, canonical_type, source, external_id, config)
                    .await
                    .inspect_err(|err| op.fail(err.code()))?,
            )
        } else {
            None
        };

        let outcome = if config.is_source_processor {
            self.process_source_entity(
                external_id,
                canonical_type,
                source,
                content,
                config,
                duplicate_result,
                custom_attributes,
                source_metadata,
            )
            .await
        } else {
            self.process_existing_entity(
                external_id,
                source,
                config,
                duplicate_result,
                custom_attributes,
            )
            .await
        };

        outcome.inspect_err(|err| op.fail(err.code()))
    }

    /// Runs detection, degrading to a `DETECTION_FAILED` result when the
    /// configuration allows failing open.
    async fn perform_duplicate_detection(
        &self,
        content: &Value,
        canonical_type: &str,
        source: &str,
        external_id: &str,
        config: &ProcessorConfig,
    ) -> Result<DuplicateDetectionResult, ExchangeError> {
        match self
            .duplicate_detection
            .detect_duplicates(
                content,
                canonical_type,
                source,
                external_id,
                config.hash_config.as_ref(),
                None,
            )
            .await
        {
            Ok(result) => Ok(result),
            Err(err) if config.fail_on_duplicate_detection_error => Err(err.into()),
            Err(err) => {
                warn!(
                    external_id,
                    source,
                    error = %err,
                    "Duplicate detection failed, continuing without it"
                );
                Ok(DuplicateDetectionResult::detection_failed(err.to_string()))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_source_entity(
        &self,
        external_id: &str,
        canonical_type: &str,
        source: &str,
        content: &Value,
        config: &ProcessorConfig,
        duplicate_result: Option<DuplicateDetectionResult>,
        custom_attributes: Option<JsonMap>,
        source_metadata: Option<JsonMap>,
    ) -> Result<ProcessingOutcome, ExchangeError> {
        let existing = self
            .entity_service
            .get_entity_by_external_id(external_id, source)
            .await?;

        // Source processors always carry fresh content.
        let attributes = self.attribute_builder.build(
            duplicate_result.as_ref(),
            custom_attributes.as_ref(),
            &config.processor_name,
            source_metadata.as_ref(),
            true,
        );

        match existing {
            None => {
                let entity_id = self
                    .entity_service
                    .create_entity(
                        external_id,
                        canonical_type,
                        source,
                        Some(content),
                        Some(attributes),
                        config.hash_config.as_ref(),
                    )
                    .await?;

                self.record_transition_best_effort(
                    config,
                    NewStateTransition::new(
                        entity_id,
                        EntityState::Received,
                        EntityState::Processing,
                        &config.processor_name,
                    )
                    .with_processor_data(self.transition_data(
                        config,
                        true,
                        1,
                        duplicate_result.as_ref(),
                    ))
                    .with_notes(format!("New entity created by {}", config.processor_name)),
                )
                .await;

                Ok(self.outcome(entity_id, 1, external_id, true, true, duplicate_result, config))
            }
            Some(_) => {
                let (entity_id, version) = self
                    .entity_service
                    .create_new_version(
                        external_id,
                        source,
                        Some(content),
                        Some(attributes),
                        config.hash_config.as_ref(),
                    )
                    .await?;

                self.record_transition_best_effort(
                    config,
                    NewStateTransition::new(
                        entity_id,
                        EntityState::Processing,
                        EntityState::Processing,
                        &config.processor_name,
                    )
                    .with_processor_data(self.transition_data(
                        config,
                        false,
                        version,
                        duplicate_result.as_ref(),
                    ))
                    .with_notes(format!(
                        "Entity version {} created by {}",
                        version, config.processor_name
                    )),
                )
                .await;

                Ok(self.outcome(
                    entity_id,
                    version,
                    external_id,
                    true,
                    false,
                    duplicate_result,
                    config,
                ))
            }
        }
    }

    async fn process_existing_entity(
        &self,
        external_id: &str,
        source: &str,
        config: &ProcessorConfig,
        duplicate_result: Option<DuplicateDetectionResult>,
        custom_attributes: Option<JsonMap>,
    ) -> Result<ProcessingOutcome, ExchangeError> {
        let existing = self
            .entity_service
            .get_entity_by_external_id(external_id, source)
            .await?
            .ok_or_else(|| {
                ValidationError::with_code(
                    ErrorCode::NotFound,
                    format!("Entity not found for non-source processor: {}", external_id),
                )
                .for_field("external_id", external_id)
            })?;

        if config.update_attributes_on_duplicate {
            if let Some(custom) = &custom_attributes {
                let mut updated = self.attribute_builder.merge_attributes(
                    existing.attributes(),
                    custom,
                    &config.preserve_attribute_keys,
                );

                if let Some(detection) = &duplicate_result {
                    updated = self
                        .attribute_builder
                        .update_duplicate_detection(&updated, detection, true);
                }

                self.entity_service
                    .update_entity_attributes(existing.id(), updated)
                    .await?;
            }
        }

        Ok(self.outcome(
            existing.id(),
            existing.version(),
            external_id,
            false,
            false,
            duplicate_result,
            config,
        ))
    }

    /// Builds the processor_data bag recorded with write-path transitions.
    fn transition_data(
        &self,
        config: &ProcessorConfig,
        is_new_entity: bool,
        version: i64,
        duplicate_result: Option<&DuplicateDetectionResult>,
    ) -> JsonMap {
        let mut custom_data = JsonMap::new();
        custom_data.insert("is_new_entity".to_string(), Value::Bool(is_new_entity));
        custom_data.insert("version".to_string(), Value::from(version));
        custom_data.insert(
            KEY_DUPLICATE_DETECTION.to_string(),
            duplicate_result.map(DuplicateDetectionResult::to_value).unwrap_or(Value::Null),
        );

        let mut data = JsonMap::new();
        data.insert(
            "processor_name".to_string(),
            Value::String(config.processor_name.clone()),
        );
        data.insert(
            "processor_version".to_string(),
            Value::String(config.processor_version.clone()),
        );
        data.insert("custom_data".to_string(), Value::Object(custom_data));
        data
    }

    /// Records a transition when tracking is enabled; never fails the write
    /// path.
    async fn record_transition_best_effort(
        &self,
        config: &ProcessorConfig,
        transition: NewStateTransition,
    ) {
        if !config.enable_state_tracking {
            return;
        }
        let Some(state_tracking) = &self.state_tracking else {
            return;
        };

        if let Err(err) = state_tracking.record_transition(transition).await {
            warn!(error = %err, "Failed to record state transition");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn outcome(
        &self,
        entity_id: EntityId,
        entity_version: i64,
        external_id: &str,
        content_changed: bool,
        is_new_entity: bool,
        duplicate_detection: Option<DuplicateDetectionResult>,
        config: &ProcessorConfig,
    ) -> ProcessingOutcome {
        let mut processing_metadata = JsonMap::new();
        processing_metadata.insert(
            "processor".to_string(),
            Value::String(config.processor_name.clone()),
        );

        ProcessingOutcome {
            entity_id,
            entity_version,
            external_id: external_id.to_string(),
            content_changed,
            is_new_entity,
            duplicate_detection,
            processing_metadata,
        }
    }
}
