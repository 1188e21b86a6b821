// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite adapter for the tenant registry.
//!
//! Tenants are keyed by their business id, not a surrogate; the adapter does
//! not consult the tenant context because tenant operations establish the
//! context other repositories require.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use entity_exchange_domain::repositories::{TenantRepository, TenantUpdate};
use entity_exchange_domain::{
    ErrorCode, RepositoryError, Tenant, TenantConfigValue, TenantContext,
};

use super::{map_db_error, parse_datetime};

/// SQLite-backed tenant registry.
pub struct SqliteTenantRepository {
    pool: SqlitePool,
    #[allow(dead_code)]
    context: TenantContext,
}

impl SqliteTenantRepository {
    pub fn new(pool: SqlitePool, context: TenantContext) -> Self {
        SqliteTenantRepository { pool, context }
    }

    fn config_from_text(
        raw: &str,
    ) -> Result<BTreeMap<String, TenantConfigValue>, RepositoryError> {
        serde_json::from_str(raw).map_err(|e| {
            RepositoryError::new(
                ErrorCode::InvalidData,
                format!("Malformed tenant_config: {}", e),
            )
        })
    }

    fn config_to_text(config: &BTreeMap<String, TenantConfigValue>) -> String {
        serde_json::to_string(config).expect("tenant_config serialization is infallible")
    }

    fn tenant_from_row(row: &SqliteRow) -> Result<Tenant, RepositoryError> {
        let config_raw: String = row.get("tenant_config");
        let created_at_raw: String = row.get("created_at");
        let updated_at_raw: String = row.get("updated_at");

        Ok(Tenant::from_parts(
            row.get("tenant_id"),
            row.get("customer_name"),
            row.get("is_active"),
            Self::config_from_text(&config_raw)?,
            row.get::<Option<String>, _>("primary_contact_name"),
            row.get::<Option<String>, _>("primary_contact_email"),
            row.get::<Option<String>, _>("primary_contact_phone"),
            row.get::<Option<String>, _>("address_line1"),
            row.get::<Option<String>, _>("address_line2"),
            row.get::<Option<String>, _>("city"),
            row.get::<Option<String>, _>("state"),
            row.get::<Option<String>, _>("postal_code"),
            row.get::<Option<String>, _>("country"),
            row.get::<Option<String>, _>("notes"),
            parse_datetime(&created_at_raw, "created_at")?,
            parse_datetime(&updated_at_raw, "updated_at")?,
        ))
    }

    async fn fetch_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM tenant WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("tenant_get_by_id", e))?;

        row.as_ref().map(Self::tenant_from_row).transpose()
    }

    fn not_found(tenant_id: &str, operation: &str) -> RepositoryError {
        RepositoryError::not_found(format!("Tenant not found: {}", tenant_id))
            .with_context("operation", operation)
            .with_context("tenant_id", tenant_id)
    }
}

#[async_trait]
impl TenantRepository for SqliteTenantRepository {
    async fn create(&self, tenant: &Tenant) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tenant
                (tenant_id, customer_name, is_active, tenant_config,
                 primary_contact_name, primary_contact_email, primary_contact_phone,
                 address_line1, address_line2, city, state, postal_code, country,
                 notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.tenant_id())
        .bind(tenant.customer_name())
        .bind(tenant.is_active())
        .bind(Self::config_to_text(tenant.tenant_config()))
        .bind(tenant.primary_contact_name())
        .bind(tenant.primary_contact_email())
        .bind(tenant.primary_contact_phone())
        .bind(tenant.address_line1())
        .bind(tenant.address_line2())
        .bind(tenant.city())
        .bind(tenant.state())
        .bind(tenant.postal_code())
        .bind(tenant.country())
        .bind(tenant.notes())
        .bind(tenant.created_at().to_rfc3339())
        .bind(tenant.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_db_error("tenant_create", e).with_context("tenant_id", tenant.tenant_id())
        })?;

        info!(tenant_id = %tenant.tenant_id(), "Created tenant");
        Ok(())
    }

    async fn get_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, RepositoryError> {
        self.fetch_tenant(tenant_id).await
    }

    async fn update(
        &self,
        tenant_id: &str,
        update: &TenantUpdate,
    ) -> Result<Tenant, RepositoryError> {
        let existing = self
            .fetch_tenant(tenant_id)
            .await?
            .ok_or_else(|| Self::not_found(tenant_id, "tenant_update"))?;

        let updated = Tenant::from_parts(
            existing.tenant_id().to_string(),
            update
                .customer_name
                .clone()
                .unwrap_or_else(|| existing.customer_name().to_string()),
            existing.is_active(),
            existing.tenant_config().clone(),
            update
                .primary_contact_name
                .clone()
                .or_else(|| existing.primary_contact_name().map(String::from)),
            update
                .primary_contact_email
                .clone()
                .or_else(|| existing.primary_contact_email().map(String::from)),
            update
                .primary_contact_phone
                .clone()
                .or_else(|| existing.primary_contact_phone().map(String::from)),
            update
                .address_line1
                .clone()
                .or_else(|| existing.address_line1().map(String::from)),
            update
                .address_line2
                .clone()
                .or_else(|| existing.address_line2().map(String::from)),
            update.city.clone().or_else(|| existing.city().map(String::from)),
            update
                .state
                .clone()
                .or_else(|| existing.state().map(String::from)),
            update
                .postal_code
                .clone()
                .or_else(|| existing.postal_code().map(String::from)),
            update
                .country
                .clone()
                .or_else(|| existing.country().map(String::from)),
            update
                .notes
                .clone()
                .or_else(|| existing.notes().map(String::from)),
            existing.created_at(),
            Utc::now(),
        );

        sqlx::query(
            r#"
            UPDATE tenant SET
                customer_name = ?, primary_contact_name = ?, primary_contact_email = ?,
                primary_contact_phone = ?, address_line1 = ?, address_line2 = ?,
                city = ?, state = ?, postal_code = ?, country = ?, notes = ?,
                updated_at = ?
            WHERE tenant_id = ?
            "#,
        )
        .bind(updated.customer_name())
        .bind(updated.primary_contact_name())
        .bind(updated.primary_contact_email())
        .bind(updated.primary_contact_phone())
        .bind(updated.address_line1())
        .bind(updated.address_line2())
        .bind(updated.city())
        .bind(updated.state())
        .bind(updated.postal_code())
        .bind(updated.country())
        .bind(updated.notes())
        .bind(updated.updated_at().to_rfc3339())
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("tenant_update", e))?;

        info!(tenant_id = %tenant_id, "Updated tenant");
        Ok(updated)
    }

    async fn update_config(
        &self,
        tenant_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("tenant_update_config", e))?;

        let config_raw: Option<String> =
            sqlx::query_scalar("SELECT tenant_config FROM tenant WHERE tenant_id = ?")
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_db_error("tenant_update_config", e))?;

        let config_raw =
            config_raw.ok_or_else(|| Self::not_found(tenant_id, "tenant_update_config"))?;

        let mut config = Self::config_from_text(&config_raw)?;
        config.insert(key.to_string(), TenantConfigValue::new(value));

        sqlx::query("UPDATE tenant SET tenant_config = ?, updated_at = ? WHERE tenant_id = ?")
            .bind(Self::config_to_text(&config))
            .bind(Utc::now().to_rfc3339())
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("tenant_update_config", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("tenant_update_config", e))?;

        info!(tenant_id = %tenant_id, config_key = %key, "Updated tenant config");
        Ok(())
    }

    async fn set_active(&self, tenant_id: &str, is_active: bool) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE tenant SET is_active = ?, updated_at = ? WHERE tenant_id = ?")
                .bind(is_active)
                .bind(Utc::now().to_rfc3339())
                .bind(tenant_id)
                .execute(&self.pool)
                .await
                .map_err(|e| map_db_error("tenant_set_active", e))?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(tenant_id, "tenant_set_active"));
        }

        info!(tenant_id = %tenant_id, is_active, "Changed tenant activation");
        Ok(())
    }
}
