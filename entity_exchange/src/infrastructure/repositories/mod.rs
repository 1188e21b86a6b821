// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Repository Adapters
//!
//! Concrete implementations of the domain persistence ports over `sqlx` and
//! SQLite. Each adapter holds a connection pool plus the invocation's tenant
//! context, scopes every query to the active tenant, and maps driver errors
//! to the domain's semantic repository error codes:
//!
//! - unique constraint violations -> `DUPLICATE`
//! - foreign key violations -> `CONSTRAINT_VIOLATION`
//! - anything else from the driver -> `DATABASE_ERROR`
//!
//! Timestamps are stored as RFC 3339 strings in UTC (constant offset, so
//! lexicographic comparison matches chronological order); JSON bags are
//! stored as serialized text columns.
//!
//! ## Schema
//!
//! Four tables, applied through the workspace `migrations/` directory:
//!
//! ```sql
//! tenant(tenant_id PK, customer_name, is_active, tenant_config JSON, ...)
//!
//! entity(id PK, tenant_id FK CASCADE, external_id, canonical_type, source,
//!        content_hash, attributes JSON, version, created_at, updated_at,
//!        UNIQUE(tenant_id, source, external_id, version),
//!        INDEX(content_hash, source), INDEX(tenant_id, canonical_type))
//!
//! state_transition(id PK, entity_id FK CASCADE, tenant_id FK CASCADE,
//!        from_state, to_state, actor, transition_type, processor_data JSON,
//!        queue_source, queue_destination, transition_duration,
//!        sequence_number, notes, created_at,
//!        UNIQUE(entity_id, sequence_number))
//!
//! processing_error(id PK, entity_id FK CASCADE, tenant_id FK CASCADE,
//!        error_type_code, message, processing_step, stack_trace, created_at)
//! ```
//!
//! The two uniqueness constraints carry the concurrency story: version
//! collisions and sequence-number collisions between concurrent writers
//! surface as `DUPLICATE` errors instead of corrupting history.

pub mod schema;
mod sqlite_entity_repository;
mod sqlite_processing_error_repository;
mod sqlite_state_transition_repository;
mod sqlite_tenant_repository;

pub use sqlite_entity_repository::SqliteEntityRepository;
pub use sqlite_processing_error_repository::SqliteProcessingErrorRepository;
pub use sqlite_state_transition_repository::SqliteStateTransitionRepository;
pub use sqlite_tenant_repository::SqliteTenantRepository;

use chrono::{DateTime, Utc};
use entity_exchange_domain::{ErrorCode, JsonMap, RepositoryError, TenantContext};

/// Maps a driver error to a repository error with a semantic code.
pub(crate) fn map_db_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    let mapped = match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_lowercase();
            if message.contains("unique constraint") {
                RepositoryError::duplicate(format!("Duplicate record: {}", db_err.message()))
            } else if message.contains("foreign key constraint") {
                RepositoryError::constraint_violation(format!(
                    "Invalid tenant or reference: {}",
                    db_err.message()
                ))
            } else {
                RepositoryError::database_error(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => RepositoryError::not_found("Record not found"),
        other => RepositoryError::database_error(format!("Database error: {}", other)),
    };

    mapped.with_context("operation", operation).with_cause(err)
}

/// Resolves the active tenant or fails the operation with
/// `VALIDATION_FAILED`.
pub(crate) fn require_tenant(
    context: &TenantContext,
    operation: &str,
) -> Result<String, RepositoryError> {
    context.require_current_tenant().map_err(|e| {
        RepositoryError::validation_failed(e.message).with_context("operation", operation)
    })
}

/// Parses a stored RFC 3339 timestamp.
pub(crate) fn parse_datetime(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            RepositoryError::new(
                ErrorCode::InvalidData,
                format!("Malformed timestamp in column {}: {}", column, e),
            )
        })
}

/// Parses a stored JSON object column.
pub(crate) fn parse_json_map(raw: &str, column: &str) -> Result<JsonMap, RepositoryError> {
    serde_json::from_str(raw).map_err(|e| {
        RepositoryError::new(
            ErrorCode::InvalidData,
            format!("Malformed JSON in column {}: {}", column, e),
        )
    })
}

/// Serializes a JSON bag for storage.
pub(crate) fn to_json_text(map: &JsonMap) -> String {
    serde_json::to_string(map).expect("JSON map serialization is infallible")
}
