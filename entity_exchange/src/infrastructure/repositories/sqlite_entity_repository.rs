// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Entity Repository
//!
//! Concrete adapter implementing the entity repository port over SQLite.
//!
//! ## Versioning Under Concurrency
//!
//! `create_new_version` reads the current maximum version and inserts the
//! next one inside a single transaction. Concurrent writers for the same
//! `(tenant, source, external_id)` tuple race at the
//! `UNIQUE(tenant_id, source, external_id, version)` constraint; the loser
//! receives a `DUPLICATE` error and may retry. Distinct tuples never
//! contend.
//!
//! ## Tenant Scoping
//!
//! Every statement filters on the tenant resolved from the invocation's
//! context. An entity created under tenant A is invisible to any query run
//! under tenant B, including lookups by primary key.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use entity_exchange_domain::repositories::{
    EntityFilter, EntityRepository, NewEntity, NewEntityVersion,
};
use entity_exchange_domain::{
    Entity, EntityId, ErrorCode, JsonMap, RepositoryError, TenantContext,
};

use super::{map_db_error, parse_datetime, parse_json_map, require_tenant, to_json_text};

/// SQLite-backed entity store.
pub struct SqliteEntityRepository {
    pool: SqlitePool,
    context: TenantContext,
}

impl SqliteEntityRepository {
    pub fn new(pool: SqlitePool, context: TenantContext) -> Self {
        SqliteEntityRepository { pool, context }
    }

    fn entity_from_row(row: &SqliteRow) -> Result<Entity, RepositoryError> {
        let raw_id: String = row.get("id");
        let id = EntityId::parse(&raw_id).map_err(|e| {
            RepositoryError::new(ErrorCode::InvalidData, format!("Malformed entity id: {}", e))
        })?;

        let attributes_raw: String = row.get("attributes");
        let created_at_raw: String = row.get("created_at");
        let updated_at_raw: String = row.get("updated_at");

        Ok(Entity::from_parts(
            id,
            row.get("tenant_id"),
            row.get("external_id"),
            row.get("canonical_type"),
            row.get("source"),
            row.get::<Option<String>, _>("content_hash"),
            parse_json_map(&attributes_raw, "attributes")?,
            row.get("version"),
            parse_datetime(&created_at_raw, "created_at")?,
            parse_datetime(&updated_at_raw, "updated_at")?,
        ))
    }

    /// Inserts an entity row within the given executor.
    async fn insert_entity<'e, E>(executor: E, entity: &Entity) -> Result<(), RepositoryError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO entity
                (id, tenant_id, external_id, canonical_type, source, content_hash,
                 attributes, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entity.id().to_string())
        .bind(entity.tenant_id())
        .bind(entity.external_id())
        .bind(entity.canonical_type())
        .bind(entity.source())
        .bind(entity.content_hash())
        .bind(to_json_text(entity.attributes()))
        .bind(entity.version())
        .bind(entity.created_at().to_rfc3339())
        .bind(entity.updated_at().to_rfc3339())
        .execute(executor)
        .await
        .map_err(|e| map_db_error("entity_create", e))?;

        Ok(())
    }
}

#[async_trait]
impl EntityRepository for SqliteEntityRepository {
    async fn create(&self, new_entity: NewEntity) -> Result<EntityId, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_create")?;

        let entity = Entity::new(
            tenant_id.clone(),
            new_entity.external_id,
            new_entity.canonical_type,
            new_entity.source,
            new_entity.content_hash,
            new_entity.attributes,
            new_entity.version,
        )
        .map_err(|e| {
            RepositoryError::validation_failed(e.message).with_context("operation", "entity_create")
        })?;

        Self::insert_entity(&self.pool, &entity).await?;

        info!(
            entity_id = %entity.id(),
            tenant_id = %tenant_id,
            canonical_type = %entity.canonical_type(),
            source = %entity.source(),
            version = entity.version(),
            "Created entity"
        );

        Ok(entity.id())
    }

    async fn get_by_id(&self, id: EntityId) -> Result<Option<Entity>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_get_by_id")?;

        let row = sqlx::query("SELECT * FROM entity WHERE id = ? AND tenant_id = ?")
            .bind(id.to_string())
            .bind(&tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("entity_get_by_id", e))?;

        row.as_ref().map(Self::entity_from_row).transpose()
    }

    async fn get_latest_by_external_id(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Option<Entity>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_get_by_external_id")?;

        let row = sqlx::query(
            r#"
            SELECT * FROM entity
            WHERE external_id = ? AND source = ? AND tenant_id = ?
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(external_id)
        .bind(source)
        .bind(&tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error("entity_get_by_external_id", e))?;

        row.as_ref().map(Self::entity_from_row).transpose()
    }

    async fn get_version_by_external_id(
        &self,
        external_id: &str,
        source: &str,
        version: i64,
    ) -> Result<Option<Entity>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_get_by_external_id")?;

        let row = sqlx::query(
            r#"
            SELECT * FROM entity
            WHERE external_id = ? AND source = ? AND tenant_id = ? AND version = ?
            "#,
        )
        .bind(external_id)
        .bind(source)
        .bind(&tenant_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error("entity_get_by_external_id", e))?;

        row.as_ref().map(Self::entity_from_row).transpose()
    }

    async fn get_all_versions(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_get_all_versions")?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM entity
            WHERE external_id = ? AND source = ? AND tenant_id = ?
            ORDER BY version ASC
            "#,
        )
        .bind(external_id)
        .bind(source)
        .bind(&tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("entity_get_all_versions", e))?;

        rows.iter().map(Self::entity_from_row).collect()
    }

    async fn get_max_version(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<i64, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_get_max_version")?;

        let max_version: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(version), 0) FROM entity
            WHERE external_id = ? AND source = ? AND tenant_id = ?
            "#,
        )
        .bind(external_id)
        .bind(source)
        .bind(&tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("entity_get_max_version", e))?;

        Ok(max_version)
    }

    async fn get_by_content_hash(
        &self,
        content_hash: &str,
        source: &str,
    ) -> Result<Option<Entity>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_get_by_content_hash")?;

        let row = sqlx::query(
            r#"
            SELECT * FROM entity
            WHERE content_hash = ? AND source = ? AND tenant_id = ?
            LIMIT 1
            "#,
        )
        .bind(content_hash)
        .bind(source)
        .bind(&tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error("entity_get_by_content_hash", e))?;

        row.as_ref().map(Self::entity_from_row).transpose()
    }

    async fn create_new_version(
        &self,
        request: NewEntityVersion,
    ) -> Result<(EntityId, i64), RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_create_new_version")?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("entity_create_new_version", e))?;

        let current_max: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(version), 0) FROM entity
            WHERE external_id = ? AND source = ? AND tenant_id = ?
            "#,
        )
        .bind(&request.external_id)
        .bind(&request.source)
        .bind(&tenant_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error("entity_create_new_version", e))?;

        let new_version = current_max + 1;

        // First version requires an explicit canonical type; later versions
        // inherit from the latest row unless one is given.
        let canonical_type = match (&request.canonical_type, current_max) {
            (Some(canonical_type), _) => canonical_type.clone(),
            (None, 0) => {
                return Err(RepositoryError::validation_failed(
                    "canonical_type is required when creating the first version of an entity",
                )
                .with_context("operation", "entity_create_new_version")
                .with_context("external_id", &request.external_id));
            }
            (None, _) => sqlx::query_scalar(
                r#"
                SELECT canonical_type FROM entity
                WHERE external_id = ? AND source = ? AND tenant_id = ?
                ORDER BY version DESC
                LIMIT 1
                "#,
            )
            .bind(&request.external_id)
            .bind(&request.source)
            .bind(&tenant_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_db_error("entity_create_new_version", e))?,
        };

        let entity = Entity::new(
            tenant_id.clone(),
            request.external_id.clone(),
            canonical_type,
            request.source.clone(),
            request.content_hash,
            request.attributes,
            new_version,
        )
        .map_err(|e| {
            RepositoryError::validation_failed(e.message)
                .with_context("operation", "entity_create_new_version")
        })?;

        Self::insert_entity(&mut *tx, &entity).await?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("entity_create_new_version", e))?;

        info!(
            entity_id = %entity.id(),
            tenant_id = %tenant_id,
            external_id = %request.external_id,
            source = %request.source,
            version = new_version,
            previous_max = current_max,
            "Created new entity version"
        );

        Ok((entity.id(), new_version))
    }

    async fn list(
        &self,
        filter: &EntityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Entity>, i64), RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_list")?;

        let mut conditions = String::new();
        if filter.external_id.is_some() {
            conditions.push_str(" AND external_id = ?");
        }
        if filter.canonical_type.is_some() {
            conditions.push_str(" AND canonical_type = ?");
        }
        if filter.source.is_some() {
            conditions.push_str(" AND source = ?");
        }
        if filter.content_hash.is_some() {
            conditions.push_str(" AND content_hash = ?");
        }
        if filter.created_after.is_some() {
            conditions.push_str(" AND created_at >= ?");
        }
        if filter.created_before.is_some() {
            conditions.push_str(" AND created_at <= ?");
        }
        if filter.updated_after.is_some() {
            conditions.push_str(" AND updated_at >= ?");
        }
        if filter.updated_before.is_some() {
            conditions.push_str(" AND updated_at <= ?");
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM entity WHERE tenant_id = ?{}",
            conditions
        );
        let mut count_query = sqlx::query_scalar(&count_sql).bind(&tenant_id);
        if let Some(v) = &filter.external_id {
            count_query = count_query.bind(v);
        }
        if let Some(v) = &filter.canonical_type {
            count_query = count_query.bind(v);
        }
        if let Some(v) = &filter.source {
            count_query = count_query.bind(v);
        }
        if let Some(v) = &filter.content_hash {
            count_query = count_query.bind(v);
        }
        if let Some(v) = &filter.created_after {
            count_query = count_query.bind(v.to_rfc3339());
        }
        if let Some(v) = &filter.created_before {
            count_query = count_query.bind(v.to_rfc3339());
        }
        if let Some(v) = &filter.updated_after {
            count_query = count_query.bind(v.to_rfc3339());
        }
        if let Some(v) = &filter.updated_before {
            count_query = count_query.bind(v.to_rfc3339());
        }
        let total: i64 = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("entity_list", e))?;

        let page_sql = format!(
            "SELECT * FROM entity WHERE tenant_id = ?{} ORDER BY updated_at DESC LIMIT ? OFFSET ?",
            conditions
        );
        let mut query = sqlx::query(&page_sql).bind(&tenant_id);
        if let Some(v) = &filter.external_id {
            query = query.bind(v);
        }
        if let Some(v) = &filter.canonical_type {
            query = query.bind(v);
        }
        if let Some(v) = &filter.source {
            query = query.bind(v);
        }
        if let Some(v) = &filter.content_hash {
            query = query.bind(v);
        }
        if let Some(v) = &filter.created_after {
            query = query.bind(v.to_rfc3339());
        }
        if let Some(v) = &filter.created_before {
            query = query.bind(v.to_rfc3339());
        }
        if let Some(v) = &filter.updated_after {
            query = query.bind(v.to_rfc3339());
        }
        if let Some(v) = &filter.updated_before {
            query = query.bind(v.to_rfc3339());
        }

        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("entity_list", e))?;

        let entities = rows
            .iter()
            .map(Self::entity_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            tenant_id = %tenant_id,
            returned = entities.len(),
            total,
            "Listed entities"
        );

        Ok((entities, total))
    }

    async fn update_attributes(
        &self,
        id: EntityId,
        attributes: JsonMap,
    ) -> Result<(), RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_update_attributes")?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("entity_update_attributes", e))?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT attributes FROM entity WHERE id = ? AND tenant_id = ?")
                .bind(id.to_string())
                .bind(&tenant_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_db_error("entity_update_attributes", e))?;

        let existing = existing.ok_or_else(|| {
            RepositoryError::not_found(format!("Entity not found: {}", id))
                .with_context("operation", "entity_update_attributes")
                .with_context("entity_id", id.to_string())
                .with_context("tenant_id", &tenant_id)
        })?;

        let mut merged = parse_json_map(&existing, "attributes")?;
        for (key, value) in attributes {
            merged.insert(key, value);
        }

        sqlx::query("UPDATE entity SET attributes = ?, updated_at = ? WHERE id = ? AND tenant_id = ?")
            .bind(to_json_text(&merged))
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .bind(&tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("entity_update_attributes", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("entity_update_attributes", e))?;

        Ok(())
    }

    async fn delete(&self, id: EntityId) -> Result<bool, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "entity_delete")?;

        let result = sqlx::query("DELETE FROM entity WHERE id = ? AND tenant_id = ?")
            .bind(id.to_string())
            .bind(&tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("entity_delete", e))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(entity_id = %id, tenant_id = %tenant_id, "Deleted entity");
        }

        Ok(deleted)
    }
}
