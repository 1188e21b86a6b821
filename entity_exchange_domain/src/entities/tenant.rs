// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant
//!
//! The top-level isolation unit. Every other record in the exchange core
//! references a tenant and cascades with it. The `tenant_config` bag is an
//! open map where each entry carries its own update timestamp, so operators
//! can see when an individual setting last changed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// One entry in a tenant's configuration bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfigValue {
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl TenantConfigValue {
    /// Wraps a value, stamping the current time.
    pub fn new(value: Value) -> Self {
        TenantConfigValue {
            value,
            updated_at: Utc::now(),
        }
    }
}

/// A tenant of the exchange core.
#[derive(Debug, Clone)]
pub struct Tenant {
    // Identity fields
    tenant_id: String,

    // Core business fields
    customer_name: String,
    is_active: bool,
    tenant_config: BTreeMap<String, TenantConfigValue>,
    primary_contact_name: Option<String>,
    primary_contact_email: Option<String>,
    primary_contact_phone: Option<String>,
    address_line1: Option<String>,
    address_line2: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
    notes: Option<String>,

    // Metadata fields
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Creates a new active tenant.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION_FAILED` when the tenant id or customer name is
    /// empty or whitespace.
    pub fn new(
        tenant_id: impl Into<String>,
        customer_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let tenant_id = tenant_id.into();
        let customer_name = customer_name.into();

        if tenant_id.trim().is_empty() {
            return Err(ValidationError::new("tenant_id must be a non-empty string"));
        }
        if customer_name.trim().is_empty() {
            return Err(ValidationError::new("customer_name must be a non-empty string")
                .for_field("customer_name", customer_name));
        }

        let now = Utc::now();
        Ok(Tenant {
            tenant_id: tenant_id.trim().to_string(),
            customer_name,
            is_active: true,
            tenant_config: BTreeMap::new(),
            primary_contact_name: None,
            primary_contact_email: None,
            primary_contact_phone: None,
            address_line1: None,
            address_line2: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrates a tenant from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        tenant_id: String,
        customer_name: String,
        is_active: bool,
        tenant_config: BTreeMap<String, TenantConfigValue>,
        primary_contact_name: Option<String>,
        primary_contact_email: Option<String>,
        primary_contact_phone: Option<String>,
        address_line1: Option<String>,
        address_line2: Option<String>,
        city: Option<String>,
        state: Option<String>,
        postal_code: Option<String>,
        country: Option<String>,
        notes: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Tenant {
            tenant_id,
            customer_name,
            is_active,
            tenant_config,
            primary_contact_name,
            primary_contact_email,
            primary_contact_phone,
            address_line1,
            address_line2,
            city,
            state,
            postal_code,
            country,
            notes,
            created_at,
            updated_at,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn tenant_config(&self) -> &BTreeMap<String, TenantConfigValue> {
        &self.tenant_config
    }

    pub fn primary_contact_name(&self) -> Option<&str> {
        self.primary_contact_name.as_deref()
    }

    pub fn primary_contact_email(&self) -> Option<&str> {
        self.primary_contact_email.as_deref()
    }

    pub fn primary_contact_phone(&self) -> Option<&str> {
        self.primary_contact_phone.as_deref()
    }

    pub fn address_line1(&self) -> Option<&str> {
        self.address_line1.as_deref()
    }

    pub fn address_line2(&self) -> Option<&str> {
        self.address_line2.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Reads a configuration value by key, falling back to the given default.
    pub fn config_value<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.tenant_config
            .get(key)
            .map(|entry| &entry.value)
            .unwrap_or(default)
    }

    /// Sets a configuration value, stamping the entry's timestamp.
    pub fn set_config_value(&mut self, key: impl Into<String>, value: Value) {
        self.tenant_config
            .insert(key.into(), TenantConfigValue::new(value));
        self.updated_at = Utc::now();
    }

    pub fn set_customer_name(&mut self, customer_name: impl Into<String>) {
        self.customer_name = customer_name.into();
        self.updated_at = Utc::now();
    }

    pub fn set_active(&mut self, is_active: bool) {
        self.is_active = is_active;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_tenant_is_active_and_trimmed() {
        let tenant = Tenant::new("  tenant-a  ", "Acme").unwrap();
        assert_eq!(tenant.tenant_id(), "tenant-a");
        assert!(tenant.is_active());
        assert!(tenant.tenant_config().is_empty());
    }

    #[test]
    fn blank_tenant_id_is_rejected() {
        assert!(Tenant::new("   ", "Acme").is_err());
        assert!(Tenant::new("tenant-a", "").is_err());
    }

    #[test]
    fn config_values_carry_their_own_timestamps() {
        let mut tenant = Tenant::new("tenant-a", "Acme").unwrap();
        tenant.set_config_value("batch_size", json!(25));

        let entry = tenant.tenant_config().get("batch_size").unwrap();
        assert_eq!(entry.value, json!(25));

        let default = json!(100);
        assert_eq!(tenant.config_value("batch_size", &default), &json!(25));
        assert_eq!(tenant.config_value("missing", &default), &json!(100));
    }
}
