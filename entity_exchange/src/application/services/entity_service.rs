// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity Service
//!
//! Application service over the entity store. Entities are immutable:
//! changes are represented by creating new versions rather than updating
//! existing rows, and the only in-place mutation is an attribute merge.
//!
//! The service computes content hashes from canonical content before
//! persistence and converts repository failures to service errors while
//! letting `NOT_FOUND` and `DUPLICATE` bubble up with their semantic codes.

use std::sync::Arc;

use futures::Stream;
use serde_json::Value;
use tracing::info;

use entity_exchange_domain::repositories::{
    EntityFilter, EntityRepository, NewEntity, NewEntityVersion,
};
use entity_exchange_domain::services::calculate_content_hash;
use entity_exchange_domain::{
    Entity, EntityId, ErrorCode, HashConfig, JsonMap, RepositoryError, ServiceError,
    TenantContext,
};

use crate::application::context::Operation;

/// Service for working with the immutable entity store.
pub struct EntityService {
    repository: Arc<dyn EntityRepository>,
    context: TenantContext,
}

impl EntityService {
    pub fn new(repository: Arc<dyn EntityRepository>, context: TenantContext) -> Self {
        EntityService {
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

    fn content_hash(
        content: Option<&Value>,
        hash_config: Option<&HashConfig>,
    ) -> Option<String> {
        content.map(|data| calculate_content_hash(data, hash_config))
    }

    /// Creates a new entity at version 1, hashing the canonical content when
    /// given.
    pub async fn create_entity(
        &self,
        external_id: &str,
        canonical_type: &str,
        source: &str,
        content: Option<&Value>,
        attributes: Option<JsonMap>,
        hash_config: Option<&HashConfig>,
    ) -> Result<EntityId, ServiceError> {
        let mut op = Operation::start("entity_service_create", &self.context);

        let new_entity = NewEntity::new(external_id, canonical_type, source)
            .with_attributes(attributes.unwrap_or_default());
        let new_entity = match Self::content_hash(content, hash_config) {
            Some(hash) => new_entity.with_content_hash(hash),
            None => new_entity,
        };

        let entity_id = self
            .repository
            .create(new_entity)
            .await
            .map_err(|e| self.service_error("create_entity", e))
            .inspect_err(|err| op.fail(err.code))?;

        info!(
            entity_id = %entity_id,
            external_id,
            source,
            "Created entity"
        );

        Ok(entity_id)
    }

    /// Creates the next version of an existing entity, returning the new id
    /// and version number.
    pub async fn create_new_version(
        &self,
        external_id: &str,
        source: &str,
        content: Option<&Value>,
        attributes: Option<JsonMap>,
        hash_config: Option<&HashConfig>,
    ) -> Result<(EntityId, i64), ServiceError> {
        let mut op = Operation::start("entity_service_create_new_version", &self.context);

        let request = NewEntityVersion::new(external_id, source)
            .with_attributes(attributes.unwrap_or_default());
        let request = match Self::content_hash(content, hash_config) {
            Some(hash) => request.with_content_hash(hash),
            None => request,
        };

        let (entity_id, version) = self
            .repository
            .create_new_version(request)
            .await
            .map_err(|e| self.service_error("create_new_version", e))
            .inspect_err(|err| op.fail(err.code))?;

        info!(
            entity_id = %entity_id,
            external_id,
            source,
            version,
            "Created new entity version"
        );

        Ok((entity_id, version))
    }

    pub async fn get_entity(&self, entity_id: EntityId) -> Result<Option<Entity>, ServiceError> {
        let mut op = Operation::start("entity_service_get", &self.context);
        self.repository
            .get_by_id(entity_id)
            .await
            .map_err(|e| self.service_error("get_entity", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Fetches an entity by id, failing with `NOT_FOUND` when it is absent.
    pub async fn require_entity(&self, entity_id: EntityId) -> Result<Entity, ServiceError> {
        self.get_entity(entity_id).await?.ok_or_else(|| {
            ServiceError::new(
                ErrorCode::NotFound,
                format!("Entity not found: {}", entity_id),
                "require_entity",
            )
            .for_entity(entity_id.to_string())
        })
    }

    /// Fetches the latest version for `(external_id, source)`.
    pub async fn get_entity_by_external_id(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Option<Entity>, ServiceError> {
        let mut op = Operation::start("entity_service_get_by_external_id", &self.context);
        self.repository
            .get_latest_by_external_id(external_id, source)
            .await
            .map_err(|e| self.service_error("get_entity_by_external_id", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Fetches the latest version, failing with `NOT_FOUND` when absent.
    pub async fn require_entity_by_external_id(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Entity, ServiceError> {
        self.get_entity_by_external_id(external_id, source)
            .await?
            .ok_or_else(|| {
                ServiceError::new(
                    ErrorCode::NotFound,
                    format!("Entity not found: external_id={}, source={}", external_id, source),
                    "require_entity_by_external_id",
                )
            })
    }

    /// Fetches a specific version for `(external_id, source)`.
    pub async fn get_entity_version(
        &self,
        external_id: &str,
        source: &str,
        version: i64,
    ) -> Result<Option<Entity>, ServiceError> {
        let mut op = Operation::start("entity_service_get_version", &self.context);
        self.repository
            .get_version_by_external_id(external_id, source, version)
            .await
            .map_err(|e| self.service_error("get_entity_version", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Fetches every version for `(external_id, source)`, ordered by
    /// version.
    pub async fn get_all_versions(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Vec<Entity>, ServiceError> {
        let mut op = Operation::start("entity_service_get_all_versions", &self.context);
        self.repository
            .get_all_versions(external_id, source)
            .await
            .map_err(|e| self.service_error("get_all_versions", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Returns the maximum version for `(external_id, source)`, or 0 when
    /// the entity does not exist.
    pub async fn get_max_version(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<i64, ServiceError> {
        let mut op = Operation::start("entity_service_get_max_version", &self.context);
        self.repository
            .get_max_version(external_id, source)
            .await
            .map_err(|e| self.service_error("get_max_version", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Fetches an entity by `(content_hash, source)`.
    pub async fn get_entity_by_content_hash(
        &self,
        content_hash: &str,
        source: &str,
    ) -> Result<Option<Entity>, ServiceError> {
        let mut op = Operation::start("entity_service_get_by_content_hash", &self.context);
        self.repository
            .get_by_content_hash(content_hash, source)
            .await
            .map_err(|e| self.service_error("get_entity_by_content_hash", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Shallow-merges attributes into an entity.
    pub async fn update_entity_attributes(
        &self,
        entity_id: EntityId,
        attributes: JsonMap,
    ) -> Result<(), ServiceError> {
        let mut op = Operation::start("entity_service_update_attributes", &self.context);
        self.repository
            .update_attributes(entity_id, attributes)
            .await
            .map_err(|e| self.service_error("update_entity_attributes", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Hard-deletes an entity. Returns `false` when nothing was deleted.
    pub async fn delete_entity(&self, entity_id: EntityId) -> Result<bool, ServiceError> {
        let mut op = Operation::start("entity_service_delete", &self.context);
        self.repository
            .delete(entity_id)
            .await
            .map_err(|e| self.service_error("delete_entity", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Lists entities matching the filter, newest-updated first.
    pub async fn list_entities(
        &self,
        filter: &EntityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Entity>, i64), ServiceError> {
        let mut op = Operation::start("entity_service_list", &self.context);
        self.repository
            .list(filter, limit, offset)
            .await
            .map_err(|e| self.service_error("list_entities", e))
            .inspect_err(|err| op.fail(err.code))
    }

    /// Streams entities matching the filter, fetching them in batches so
    /// large result sets never sit in memory at once.
    pub fn iter_entities(
        &self,
        filter: EntityFilter,
        batch_size: i64,
    ) -> impl Stream<Item = Result<Entity, ServiceError>> + '_ {
        async_stream::try_stream! {
            let mut offset = 0i64;
            loop {
                let (entities, total) = self.list_entities(&filter, batch_size, offset).await?;
                if entities.is_empty() {
                    break;
                }
                for entity in entities {
                    yield entity;
                }
                offset += batch_size;
                if offset >= total {
                    break;
                }
            }
        }
    }
}
