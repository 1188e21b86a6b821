// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Service
//!
//! Registry operations for tenants: creation, descriptive updates, per-key
//! configuration writes, and activation toggles. Every mutation invalidates
//! the context's tenant cache so subsequent lookups observe fresh state.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use entity_exchange_domain::repositories::{TenantRepository, TenantUpdate};
use entity_exchange_domain::{
    ErrorCode, RepositoryError, ServiceError, Tenant, TenantContext,
};

use crate::application::context::Operation;

/// Service over the tenant registry.
pub struct TenantService {
    repository: Arc<dyn TenantRepository>,
    context: TenantContext,
}

impl TenantService {
    pub fn new(repository: Arc<dyn TenantRepository>, context: TenantContext) -> Self {
        TenantService {
            repository,
            context,
        }
    }

    fn service_error(&self, operation: &'static str, err: RepositoryError) -> ServiceError {
        ServiceError::from_repository(operation, err)
    }

    fn require_tenant(&self, operation: &'static str) -> Result<String, ServiceError> {
        self.context.require_current_tenant().map_err(|e| {
            ServiceError::new(ErrorCode::ValidationFailed, e.message, operation)
        })
    }

    /// Creates a new tenant. Fails with `VALIDATION_FAILED` when the id is
    /// already taken.
    pub async fn create_tenant(&self, tenant: Tenant) -> Result<(), ServiceError> {
        let mut op = Operation::start("tenant_service_create", &self.context);

        if self
            .repository
            .get_by_id(tenant.tenant_id())
            .await
            .map_err(|e| self.service_error("create_tenant", e))
            .inspect_err(|err| op.fail(err.code))?
            .is_some()
        {
            warn!(tenant_id = %tenant.tenant_id(), "Tenant already exists");
            let err = ServiceError::new(
                ErrorCode::ValidationFailed,
                format!("Tenant with ID {} already exists", tenant.tenant_id()),
                "create_tenant",
            )
            .for_tenant(tenant.tenant_id().to_string());
            op.fail(err.code);
            return Err(err);
        }

        let tenant_id = tenant.tenant_id().to_string();
        self.repository
            .create(&tenant)
            .await
            .map_err(|e| self.service_error("create_tenant", e))
            .inspect_err(|err| op.fail(err.code))?;

        self.context.clear_cache(None);

        info!(tenant_id = %tenant_id, "Created new tenant");
        Ok(())
    }

    /// Fetches a tenant by explicit id, consulting the context cache first.
    pub async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, ServiceError> {
        let mut op = Operation::start("tenant_service_get", &self.context);

        if let Some(cached) = self.context.cached_tenant(tenant_id) {
            return Ok(Some(cached));
        }

        let tenant = self
            .repository
            .get_by_id(tenant_id)
            .await
            .map_err(|e| self.service_error("get_tenant", e))
            .inspect_err(|err| op.fail(err.code))?;

        if let Some(tenant) = &tenant {
            self.context.cache_tenant(tenant.clone());
        }

        Ok(tenant)
    }

    /// Fetches the tenant for the active context. Fails with `NOT_FOUND`
    /// when the tenant no longer exists.
    pub async fn get_current_tenant(&self) -> Result<Tenant, ServiceError> {
        let tenant_id = self.require_tenant("get_current_tenant")?;

        self.get_tenant(&tenant_id).await?.ok_or_else(|| {
            ServiceError::new(
                ErrorCode::NotFound,
                format!("Tenant not found: {}", tenant_id),
                "get_current_tenant",
            )
            .for_tenant(tenant_id)
        })
    }

    /// Applies a partial descriptive update to the current tenant.
    pub async fn update_tenant(&self, update: TenantUpdate) -> Result<Tenant, ServiceError> {
        let mut op = Operation::start("tenant_service_update", &self.context);
        let tenant_id = self
            .require_tenant("update_tenant")
            .inspect_err(|err| op.fail(err.code))?;

        let updated = self
            .repository
            .update(&tenant_id, &update)
            .await
            .map_err(|e| self.service_error("update_tenant", e))
            .inspect_err(|err| op.fail(err.code))?;

        self.context.clear_cache(Some(&tenant_id));

        info!(tenant_id = %tenant_id, "Updated tenant");
        Ok(updated)
    }

    /// Writes one configuration entry for the current tenant, stamping the
    /// entry's timestamp.
    pub async fn update_tenant_config(&self, key: &str, value: Value) -> Result<(), ServiceError> {
        let mut op = Operation::start("tenant_service_update_config", &self.context);
        let tenant_id = self
            .require_tenant("update_tenant_config")
            .inspect_err(|err| op.fail(err.code))?;

        self.repository
            .update_config(&tenant_id, key, value)
            .await
            .map_err(|e| self.service_error("update_tenant_config", e))
            .inspect_err(|err| op.fail(err.code))?;

        self.context.clear_cache(Some(&tenant_id));

        info!(tenant_id = %tenant_id, config_key = %key, "Updated tenant config");
        Ok(())
    }

    /// Reads a configuration value for the current tenant, with a default.
    pub async fn get_tenant_config_value(
        &self,
        key: &str,
        default: Value,
    ) -> Result<Value, ServiceError> {
        let tenant = self.get_current_tenant().await?;
        Ok(tenant.config_value(key, &default).clone())
    }

    /// Activates a tenant.
    pub async fn activate_tenant(&self, tenant_id: &str) -> Result<(), ServiceError> {
        let mut op = Operation::start("tenant_service_activate", &self.context);

        self.repository
            .set_active(tenant_id, true)
            .await
            .map_err(|e| self.service_error("activate_tenant", e))
            .inspect_err(|err| op.fail(err.code))?;

        self.context.clear_cache(Some(tenant_id));
        info!(tenant_id = %tenant_id, "Activated tenant");
        Ok(())
    }

    /// Deactivates a tenant. Existing data is preserved; new work for the
    /// tenant should be rejected by the host.
    pub async fn deactivate_tenant(&self, tenant_id: &str) -> Result<(), ServiceError> {
        let mut op = Operation::start("tenant_service_deactivate", &self.context);

        self.repository
            .set_active(tenant_id, false)
            .await
            .map_err(|e| self.service_error("deactivate_tenant", e))
            .inspect_err(|err| op.fail(err.code))?;

        self.context.clear_cache(Some(tenant_id));
        info!(tenant_id = %tenant_id, "Deactivated tenant");
        Ok(())
    }
}
