// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for the tenant registry.
//!
//! Tenant operations are the one place the core works outside an active
//! tenant context: `create` and `get_by_id` take explicit tenant ids because
//! they establish the context other repositories require.

use async_trait::async_trait;
use serde_json::Value;

use crate::entities::Tenant;
use crate::error::RepositoryError;

/// Partial update of a tenant's descriptive fields. `None` leaves a field
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct TenantUpdate {
    pub customer_name: Option<String>,
    pub primary_contact_name: Option<String>,
    pub primary_contact_email: Option<String>,
    pub primary_contact_phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
}

/// Persistence port for tenants.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Inserts a tenant. Fails with `DUPLICATE` when the id is taken.
    async fn create(&self, tenant: &Tenant) -> Result<(), RepositoryError>;

    /// Fetches a tenant by id.
    async fn get_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, RepositoryError>;

    /// Applies a partial update, returning the updated tenant. Fails with
    /// `NOT_FOUND` when the tenant does not exist.
    async fn update(
        &self,
        tenant_id: &str,
        update: &TenantUpdate,
    ) -> Result<Tenant, RepositoryError>;

    /// Writes one configuration entry, stamping its per-key timestamp.
    /// Fails with `NOT_FOUND` when the tenant does not exist.
    async fn update_config(
        &self,
        tenant_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), RepositoryError>;

    /// Activates or deactivates a tenant. Fails with `NOT_FOUND` when the
    /// tenant does not exist.
    async fn set_active(&self, tenant_id: &str, is_active: bool) -> Result<(), RepositoryError>;
}
