// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity
//!
//! The central record of the exchange core: one immutable version of an
//! external object, owned by exactly one tenant.
//!
//! ## Versioning Model
//!
//! Entities are immutable. A change to an external object is represented by
//! inserting a new row with the next version number for the same
//! `(tenant_id, source, external_id)` tuple, never by updating an existing
//! row. Versions start at 1 and increase without gaps; the storage layer
//! enforces uniqueness of `(tenant_id, source, external_id, version)`.
//!
//! The single exception to immutability is the open `attributes` bag, which
//! may be merged in place (duplicate-detection results, processor execution
//! metadata, tenant-specific keys).
//!
//! ## Identity
//!
//! - `id` - globally unique surrogate key ([`EntityId`], ULID)
//! - `(tenant_id, source, external_id, version)` - natural key
//!
//! ## Invariants
//!
//! Once created, `external_id`, `source`, `canonical_type`, `version` and
//! `content_hash` never change. `canonical_type` is limited to 50 characters.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::value_objects::EntityId;
use crate::JsonMap;

/// Maximum length of a canonical type label.
const MAX_CANONICAL_TYPE_LEN: usize = 50;

/// One immutable version of an external object.
#[derive(Debug, Clone)]
pub struct Entity {
    // Identity fields
    id: EntityId,
    tenant_id: String,

    // Core business fields
    external_id: String,
    canonical_type: String,
    source: String,
    content_hash: Option<String>,
    attributes: JsonMap,
    version: i64,

    // Metadata fields
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entity {
    /// Creates a new entity version, generating its surrogate id and
    /// timestamps.
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION_FAILED` error when `external_id`, `source` or
    /// `canonical_type` is empty, when `canonical_type` exceeds 50
    /// characters, or when `version` is below 1.
    pub fn new(
        tenant_id: impl Into<String>,
        external_id: impl Into<String>,
        canonical_type: impl Into<String>,
        source: impl Into<String>,
        content_hash: Option<String>,
        attributes: JsonMap,
        version: i64,
    ) -> Result<Self, ValidationError> {
        let tenant_id = tenant_id.into();
        let external_id = external_id.into();
        let canonical_type = canonical_type.into();
        let source = source.into();

        if tenant_id.trim().is_empty() {
            return Err(ValidationError::new("tenant_id must be a non-empty string"));
        }
        if external_id.trim().is_empty() {
            return Err(ValidationError::new("external_id must be a non-empty string")
                .for_field("external_id", external_id));
        }
        if source.trim().is_empty() {
            return Err(
                ValidationError::new("source must be a non-empty string").for_field("source", source)
            );
        }
        if canonical_type.trim().is_empty() || canonical_type.len() > MAX_CANONICAL_TYPE_LEN {
            return Err(ValidationError::new(format!(
                "canonical_type must be 1..={} characters",
                MAX_CANONICAL_TYPE_LEN
            ))
            .for_field("canonical_type", canonical_type));
        }
        if version < 1 {
            return Err(ValidationError::new("version must be >= 1")
                .for_field("version", version.to_string()));
        }

        let now = Utc::now();
        Ok(Entity {
            id: EntityId::new(),
            tenant_id,
            external_id,
            canonical_type,
            source,
            content_hash,
            attributes,
            version,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrates an entity from stored fields. Used by repository adapters;
    /// storage is trusted, so no validation is applied.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: EntityId,
        tenant_id: String,
        external_id: String,
        canonical_type: String,
        source: String,
        content_hash: Option<String>,
        attributes: JsonMap,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Entity {
            id,
            tenant_id,
            external_id,
            canonical_type,
            source,
            content_hash,
            attributes,
            version,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn canonical_type(&self) -> &str {
        &self.canonical_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn attributes(&self) -> &JsonMap {
        &self.attributes
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Merges new attributes into the existing bag (top-level keys
    /// overwritten) and bumps `updated_at`. The only mutation an entity
    /// supports.
    pub fn merge_attributes(&mut self, new_attributes: JsonMap) {
        for (key, value) in new_attributes {
            self.attributes.insert(key, value);
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, serde_json::Value)]) -> JsonMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn new_entity_stamps_identity_and_timestamps() {
        let entity = Entity::new(
            "tenant-a",
            "ORD-1",
            "order",
            "shopify",
            Some("abc123".to_string()),
            JsonMap::new(),
            1,
        )
        .unwrap();

        assert_eq!(entity.tenant_id(), "tenant-a");
        assert_eq!(entity.version(), 1);
        assert_eq!(entity.content_hash(), Some("abc123"));
        assert_eq!(entity.created_at(), entity.updated_at());
    }

    #[test]
    fn empty_external_id_is_rejected() {
        let err = Entity::new("tenant-a", "  ", "order", "shopify", None, JsonMap::new(), 1)
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("external_id"));
    }

    #[test]
    fn oversized_canonical_type_is_rejected() {
        let long_type = "x".repeat(51);
        assert!(
            Entity::new("tenant-a", "ORD-1", long_type, "shopify", None, JsonMap::new(), 1)
                .is_err()
        );
    }

    #[test]
    fn version_zero_is_rejected() {
        assert!(
            Entity::new("tenant-a", "ORD-1", "order", "shopify", None, JsonMap::new(), 0).is_err()
        );
    }

    #[test]
    fn merge_attributes_overwrites_top_level_keys() {
        let mut entity = Entity::new(
            "tenant-a",
            "ORD-1",
            "order",
            "shopify",
            None,
            attrs(&[("kept", json!(1)), ("replaced", json!("old"))]),
            1,
        )
        .unwrap();

        entity.merge_attributes(attrs(&[("replaced", json!("new")), ("added", json!(true))]));

        assert_eq!(entity.attributes()["kept"], json!(1));
        assert_eq!(entity.attributes()["replaced"], json!("new"));
        assert_eq!(entity.attributes()["added"], json!(true));
    }
}
