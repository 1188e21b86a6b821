// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Duplicate Detection Service
//!
//! Content-hash based duplicate detection against the entity store.
//!
//! ## Classification
//!
//! 1. Compute the content fingerprint under the hash configuration.
//! 2. Look up `(source, content_hash)` in the store (applying the optional
//!    exclusion filter first).
//! 3. No match -> `NEW`, confidence 100.
//! 4. Match with the same external id -> `NEW_VERSION`, confidence 90.
//! 5. Match with a different external id -> `SAME_SOURCE_CONTENT_MATCH`,
//!    confidence 90, suspicious.
//!
//! Detection failures surface as service errors here; the processing
//! service decides fail-open or fail-closed based on configuration.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use entity_exchange_domain::repositories::EntityRepository;
use entity_exchange_domain::services::{calculate_content_hash, KEY_DUPLICATE_DETECTION};
use entity_exchange_domain::{
    DuplicateDetectionResult, EntityId, HashConfig, RepositoryError, ServiceError, TenantContext,
};

use crate::application::context::Operation;

/// Content-hash duplicate detector over the entity store.
pub struct DuplicateDetectionService {
    entity_repository: Arc<dyn EntityRepository>,
    context: TenantContext,
}

impl DuplicateDetectionService {
    pub fn new(entity_repository: Arc<dyn EntityRepository>, context: TenantContext) -> Self {
        DuplicateDetectionService {
            entity_repository,
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

    /// Classifies incoming content against the store.
    pub async fn detect_duplicates(
        &self,
        content: &Value,
        entity_type: &str,
        source: &str,
        external_id: &str,
        hash_config: Option<&HashConfig>,
        exclude_entity_id: Option<EntityId>,
    ) -> Result<DuplicateDetectionResult, ServiceError> {
        let mut op = Operation::start("detect_duplicates", &self.context);

        let content_hash = calculate_content_hash(content, hash_config);

        let existing = self
            .entity_repository
            .get_by_content_hash(&content_hash, source)
            .await
            .map_err(|e| self.service_error("detect_duplicates", e))
            .inspect_err(|err| op.fail(err.code))?;

        // The exclusion filter applies before classification so re-detection
        // for an entity never matches itself.
        let existing = existing
            .filter(|entity| exclude_entity_id.map_or(true, |excluded| entity.id() != excluded));

        let mut result = match existing {
            None => DuplicateDetectionResult::new_content(content_hash),
            Some(entity) if entity.external_id() == external_id => {
                DuplicateDetectionResult::new_version(
                    content_hash,
                    entity.id().to_string(),
                    entity.external_id(),
                )
            }
            Some(entity) => DuplicateDetectionResult::same_source_content_match(
                content_hash,
                entity.id().to_string(),
                entity.external_id(),
            ),
        };

        result
            .metadata
            .insert("entity_type".to_string(), Value::String(entity_type.to_string()));
        result
            .metadata
            .insert("source".to_string(), Value::String(source.to_string()));

        debug!(
            external_id,
            source,
            reason = %result.reason,
            is_duplicate = result.is_duplicate,
            is_suspicious = result.is_suspicious,
            "Duplicate detection completed"
        );

        Ok(result)
    }

    /// Reads back the detection result stored on an entity's attributes, if
    /// one exists and parses.
    pub async fn previous_detection_result(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<DuplicateDetectionResult>, ServiceError> {
        let mut op = Operation::start("get_previous_detection_result", &self.context);

        let entity = self
            .entity_repository
            .get_by_id(entity_id)
            .await
            .map_err(|e| self.service_error("get_previous_detection_result", e))
            .inspect_err(|err| op.fail(err.code))?;

        Ok(entity.and_then(|entity| {
            entity
                .attributes()
                .get(KEY_DUPLICATE_DETECTION)
                .and_then(|value| DuplicateDetectionResult::from_value(value).ok())
        }))
    }
}
