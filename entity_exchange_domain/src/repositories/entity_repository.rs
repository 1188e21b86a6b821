// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity Repository Port
//!
//! Persistence contract for immutable entity versions. Implementations must:
//!
//! - scope every operation to the active tenant and fail with
//!   `VALIDATION_FAILED` when no tenant context is set;
//! - reject `(tenant, source, external_id, version)` collisions with
//!   `DUPLICATE` and missing-tenant references with `CONSTRAINT_VIOLATION`;
//! - assign versions atomically in `create_new_version` so concurrent
//!   writers for the same tuple race at the uniqueness constraint and the
//!   loser receives `DUPLICATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::Entity;
use crate::error::RepositoryError;
use crate::value_objects::EntityId;
use crate::JsonMap;

/// Data for creating a new entity row.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub external_id: String,
    pub canonical_type: String,
    pub source: String,
    pub content_hash: Option<String>,
    pub attributes: JsonMap,
    pub version: i64,
}

impl NewEntity {
    /// Creates a version-1 entity request.
    pub fn new(
        external_id: impl Into<String>,
        canonical_type: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        NewEntity {
            external_id: external_id.into(),
            canonical_type: canonical_type.into(),
            source: source.into(),
            content_hash: None,
            attributes: JsonMap::new(),
            version: 1,
        }
    }

    pub fn with_content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }

    pub fn with_attributes(mut self, attributes: JsonMap) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }
}

/// Data for creating the next version of an existing entity.
///
/// `canonical_type` is required only when no prior version exists (the
/// repository then creates version 1); otherwise it is inherited from the
/// latest version.
#[derive(Debug, Clone)]
pub struct NewEntityVersion {
    pub external_id: String,
    pub source: String,
    pub content_hash: Option<String>,
    pub attributes: JsonMap,
    pub canonical_type: Option<String>,
}

impl NewEntityVersion {
    pub fn new(external_id: impl Into<String>, source: impl Into<String>) -> Self {
        NewEntityVersion {
            external_id: external_id.into(),
            source: source.into(),
            content_hash: None,
            attributes: JsonMap::new(),
            canonical_type: None,
        }
    }

    pub fn with_content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }

    pub fn with_attributes(mut self, attributes: JsonMap) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_canonical_type(mut self, canonical_type: impl Into<String>) -> Self {
        self.canonical_type = Some(canonical_type.into());
        self
    }
}

/// Filter criteria for entity listing. All criteria are conjunctive;
/// `None` means "no constraint".
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub external_id: Option<String>,
    pub canonical_type: Option<String>,
    pub source: Option<String>,
    pub content_hash: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
}

/// Persistence port for entity versions.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Inserts a new entity row, returning its id.
    async fn create(&self, new_entity: NewEntity) -> Result<EntityId, RepositoryError>;

    /// Fetches an entity by id within the active tenant.
    async fn get_by_id(&self, id: EntityId) -> Result<Option<Entity>, RepositoryError>;

    /// Fetches the latest version for `(external_id, source)`.
    async fn get_latest_by_external_id(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Option<Entity>, RepositoryError>;

    /// Fetches a specific version for `(external_id, source)`.
    async fn get_version_by_external_id(
        &self,
        external_id: &str,
        source: &str,
        version: i64,
    ) -> Result<Option<Entity>, RepositoryError>;

    /// Fetches every version for `(external_id, source)`, ordered by
    /// version ascending.
    async fn get_all_versions(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Vec<Entity>, RepositoryError>;

    /// Returns the maximum version for `(external_id, source)`, or 0 when
    /// the entity does not exist.
    async fn get_max_version(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<i64, RepositoryError>;

    /// Fetches an entity by `(content_hash, source)`.
    async fn get_by_content_hash(
        &self,
        content_hash: &str,
        source: &str,
    ) -> Result<Option<Entity>, RepositoryError>;

    /// Creates the next version of an entity, returning `(id, version)`.
    async fn create_new_version(
        &self,
        request: NewEntityVersion,
    ) -> Result<(EntityId, i64), RepositoryError>;

    /// Lists entities matching the filter, newest-updated first, returning
    /// the page and the total match count.
    async fn list(
        &self,
        filter: &EntityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Entity>, i64), RepositoryError>;

    /// Shallow-merges attributes into an entity row. The only mutation of
    /// existing rows the store supports. Fails with `NOT_FOUND` when the
    /// entity does not exist in the active tenant.
    async fn update_attributes(
        &self,
        id: EntityId,
        attributes: JsonMap,
    ) -> Result<(), RepositoryError>;

    /// Hard-deletes an entity row. Returns `false` when nothing was
    /// deleted.
    async fn delete(&self, id: EntityId) -> Result<bool, RepositoryError>;
}
