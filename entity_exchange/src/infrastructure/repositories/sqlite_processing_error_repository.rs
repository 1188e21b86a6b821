// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite adapter for the processing error ledger.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use entity_exchange_domain::repositories::{
    NewProcessingError, ProcessingErrorFilter, ProcessingErrorRepository,
};
use entity_exchange_domain::{
    EntityId, ErrorCode, ErrorId, ProcessingError, RepositoryError, TenantContext,
};

use super::{map_db_error, parse_datetime, require_tenant};

/// SQLite-backed processing error ledger.
pub struct SqliteProcessingErrorRepository {
    pool: SqlitePool,
    context: TenantContext,
}

impl SqliteProcessingErrorRepository {
    pub fn new(pool: SqlitePool, context: TenantContext) -> Self {
        SqliteProcessingErrorRepository { pool, context }
    }

    fn error_from_row(row: &SqliteRow) -> Result<ProcessingError, RepositoryError> {
        let raw_id: String = row.get("id");
        let id = ErrorId::parse(&raw_id).map_err(|e| {
            RepositoryError::new(ErrorCode::InvalidData, format!("Malformed error id: {}", e))
        })?;

        let raw_entity_id: String = row.get("entity_id");
        let entity_id = EntityId::parse(&raw_entity_id).map_err(|e| {
            RepositoryError::new(ErrorCode::InvalidData, format!("Malformed entity id: {}", e))
        })?;

        let created_at_raw: String = row.get("created_at");

        Ok(ProcessingError::from_parts(
            id,
            entity_id,
            row.get("tenant_id"),
            row.get("error_type_code"),
            row.get("message"),
            row.get("processing_step"),
            row.get::<Option<String>, _>("stack_trace"),
            parse_datetime(&created_at_raw, "created_at")?,
        ))
    }
}

#[async_trait]
impl ProcessingErrorRepository for SqliteProcessingErrorRepository {
    async fn record(&self, new: NewProcessingError) -> Result<ErrorId, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "record_processing_error")?;

        let id = ErrorId::new();
        sqlx::query(
            r#"
            INSERT INTO processing_error
                (id, entity_id, tenant_id, error_type_code, message, processing_step,
                 stack_trace, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(new.entity_id.to_string())
        .bind(&tenant_id)
        .bind(&new.error_type_code)
        .bind(&new.message)
        .bind(&new.processing_step)
        .bind(&new.stack_trace)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_db_error("record_processing_error", e)
                .with_context("entity_id", new.entity_id.to_string())
        })?;

        info!(
            error_id = %id,
            entity_id = %new.entity_id,
            error_type_code = %new.error_type_code,
            processing_step = %new.processing_step,
            "Recorded processing error"
        );

        Ok(id)
    }

    async fn find_by_entity_id(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<ProcessingError>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "find_errors_by_entity")?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM processing_error
            WHERE entity_id = ? AND tenant_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(entity_id.to_string())
        .bind(&tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("find_errors_by_entity", e))?;

        rows.iter().map(Self::error_from_row).collect()
    }

    async fn get_by_filter(
        &self,
        filter: &ProcessingErrorFilter,
    ) -> Result<Vec<ProcessingError>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "get_errors_by_filter")?;

        let mut conditions = String::new();
        if filter.entity_id.is_some() {
            conditions.push_str(" AND entity_id = ?");
        }
        if filter.error_type_code.is_some() {
            conditions.push_str(" AND error_type_code = ?");
        }
        if filter.processing_step.is_some() {
            conditions.push_str(" AND processing_step = ?");
        }
        if filter.created_after.is_some() {
            conditions.push_str(" AND created_at >= ?");
        }
        if filter.created_before.is_some() {
            conditions.push_str(" AND created_at <= ?");
        }

        let sql = format!(
            "SELECT * FROM processing_error WHERE tenant_id = ?{} ORDER BY created_at DESC",
            conditions
        );

        let mut query = sqlx::query(&sql).bind(&tenant_id);
        if let Some(v) = &filter.entity_id {
            query = query.bind(v.to_string());
        }
        if let Some(v) = &filter.error_type_code {
            query = query.bind(v);
        }
        if let Some(v) = &filter.processing_step {
            query = query.bind(v);
        }
        if let Some(v) = &filter.created_after {
            query = query.bind(v.to_rfc3339());
        }
        if let Some(v) = &filter.created_before {
            query = query.bind(v.to_rfc3339());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("get_errors_by_filter", e))?;

        rows.iter().map(Self::error_from_row).collect()
    }

    async fn delete(&self, id: ErrorId) -> Result<bool, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "delete_processing_error")?;

        let result = sqlx::query("DELETE FROM processing_error WHERE id = ? AND tenant_id = ?")
            .bind(id.to_string())
            .bind(&tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("delete_processing_error", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_entity_id(&self, entity_id: EntityId) -> Result<u64, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "delete_errors_by_entity")?;

        let result =
            sqlx::query("DELETE FROM processing_error WHERE entity_id = ? AND tenant_id = ?")
                .bind(entity_id.to_string())
                .bind(&tenant_id)
                .execute(&self.pool)
                .await
                .map_err(|e| map_db_error("delete_errors_by_entity", e))?;

        Ok(result.rows_affected())
    }
}
