// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the layered error system for the entity exchange
//! domain. Failures are categorized by the layer that raised them, carry a
//! machine-readable [`ErrorCode`], and keep enough context for operators to
//! diagnose problems without digging through logs.
//!
//! ## Error Layers
//!
//! The system distinguishes three producer layers plus a catch-all:
//!
//! - [`ValidationError`] - bad input shape, missing required fields, invalid
//!   state. Never retried.
//! - [`RepositoryError`] - storage-native failures raised by repository
//!   adapters (constraint violations, connection failures), already mapped to
//!   a semantic code.
//! - [`ServiceError`] - failures surfaced by application services. Services
//!   convert repository errors into service errors while preserving the
//!   semantic codes `NOT_FOUND` and `DUPLICATE` instead of masking them.
//! - [`ExchangeError`] - the umbrella enum processors and handlers propagate
//!   with `?`.
//!
//! ## Error Codes
//!
//! [`ErrorCode`] is the shared machine-readable taxonomy. The same codes
//! appear in `ProcessingResult.error_code` on the wire and in service-layer
//! errors, so hosts can route on them without parsing messages.
//!
//! ## Design Principles
//!
//! - **Specific**: each code represents one failure mode
//! - **Actionable**: messages carry enough context for debugging
//! - **Cloneable**: errors can be cloned into ledgers and logs; causes are
//!   captured as rendered strings rather than boxed sources
//! - **Retry-aware**: [`ExchangeError::is_retryable`] encodes the default
//!   retry classification used by the processor handler

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error taxonomy shared by every layer.
///
/// The string form (see [`ErrorCode::as_str`]) is what crosses process
/// boundaries: it is stored in the processing error ledger and returned to
/// hosts in `ProcessingResult.error_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    NotFound,
    Duplicate,
    ConstraintViolation,
    DatabaseError,
    IntegrationError,
    InvalidData,
    LimitExceeded,
    InternalError,
    MissingEntityId,
    InvalidMessage,
    ValidationError,
    ServiceError,
    UnexpectedError,
    ProcessingFailure,
}

impl ErrorCode {
    /// Returns the canonical wire label for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Duplicate => "DUPLICATE",
            ErrorCode::ConstraintViolation => "CONSTRAINT_VIOLATION",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::IntegrationError => "INTEGRATION_ERROR",
            ErrorCode::InvalidData => "INVALID_DATA",
            ErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::MissingEntityId => "MISSING_ENTITY_ID",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::ServiceError => "SERVICE_ERROR",
            ErrorCode::UnexpectedError => "UNEXPECTED_ERROR",
            ErrorCode::ProcessingFailure => "PROCESSING_FAILURE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input validation failure. Not retryable by definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
    /// Field that failed validation, when one can be named.
    pub field: Option<String>,
    /// Offending value, rendered for diagnostics.
    pub value: Option<String>,
}

impl ValidationError {
    /// Creates a validation error with the default `VALIDATION_FAILED` code.
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: None,
            value: None,
        }
    }

    /// Creates a validation error with an explicit code (e.g. `NOT_FOUND`
    /// for a non-source processor referencing a missing entity).
    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        ValidationError {
            code,
            message: message.into(),
            field: None,
            value: None,
        }
    }

    /// Attaches the offending field and value.
    pub fn for_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self.value = Some(value.into());
        self
    }
}

/// Storage-layer failure raised by repository adapters.
///
/// Adapters translate driver-native errors into a `RepositoryError` with a
/// semantic code: unique-constraint violations become `DUPLICATE`, foreign
/// key violations become `CONSTRAINT_VIOLATION`, everything else falls back
/// to `DATABASE_ERROR`. The `context` map carries operation metadata
/// (operation name, tenant, entity id) for diagnostics.
#[derive(Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct RepositoryError {
    pub code: ErrorCode,
    pub message: String,
    pub context: BTreeMap<String, String>,
    /// Rendered source error, when one exists.
    pub cause: Option<String>,
}

impl RepositoryError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        RepositoryError {
            code,
            message: message.into(),
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Creates a `NOT_FOUND` error for the given resource description.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Creates a `DUPLICATE` error for a uniqueness violation.
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Duplicate, message)
    }

    /// Creates a `CONSTRAINT_VIOLATION` error (missing tenant, bad reference).
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConstraintViolation, message)
    }

    /// Creates a `DATABASE_ERROR` for driver-level failures.
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Creates a `VALIDATION_FAILED` error (e.g. no active tenant context).
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Adds a context entry, returning self for chaining.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Records the rendered source error.
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// Service-layer failure.
///
/// Produced when an application service fails an operation, either by
/// converting a [`RepositoryError`] (preserving `NOT_FOUND` / `DUPLICATE`)
/// or by raising its own failure.
#[derive(Error, Debug, Clone)]
#[error("{code}: {message} (operation: {operation})")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    pub operation: String,
    pub entity_id: Option<String>,
    pub tenant_id: Option<String>,
    /// Rendered source error, when one exists.
    pub cause: Option<String>,
}

impl ServiceError {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        ServiceError {
            code,
            message: message.into(),
            operation: operation.into(),
            entity_id: None,
            tenant_id: None,
            cause: None,
        }
    }

    /// Creates an `INTERNAL_ERROR` service error.
    pub fn internal(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message, operation)
    }

    /// Converts a repository error, preserving its semantic code.
    ///
    /// `NOT_FOUND` and `DUPLICATE` bubble up unchanged so callers can react
    /// to them; everything else keeps the repository code too, which is
    /// strictly more informative than a generic wrapper.
    pub fn from_repository(operation: impl Into<String>, err: RepositoryError) -> Self {
        let operation = operation.into();
        ServiceError {
            code: err.code,
            message: err.message.clone(),
            operation,
            entity_id: err.context.get("entity_id").cloned(),
            tenant_id: err.context.get("tenant_id").cloned(),
            cause: Some(err.to_string()),
        }
    }

    pub fn for_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// Umbrella error for the exchange core.
///
/// Processors and handlers deal in this type so any layer's failure can be
/// propagated with `?`. The processor handler classifies the variants into
/// result codes: validation failures are terminal, service and unexpected
/// failures are retryable by default.
#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ExchangeError {
    /// Creates an unexpected error from any displayable value.
    pub fn unexpected(message: impl Into<String>) -> Self {
        ExchangeError::Unexpected(message.into())
    }

    /// Returns the machine-readable code carried by this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ExchangeError::Validation(e) => e.code,
            ExchangeError::Repository(e) => e.code,
            ExchangeError::Service(e) => e.code,
            ExchangeError::Unexpected(_) => ErrorCode::UnexpectedError,
        }
    }

    /// Default retry classification: validation failures never succeed on
    /// retry; service, repository and unexpected failures might.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExchangeError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_render_wire_labels() {
        assert_eq!(ErrorCode::ValidationFailed.as_str(), "VALIDATION_FAILED");
        assert_eq!(ErrorCode::NotFound.as_str(), "NOT_FOUND");
        assert_eq!(ErrorCode::Duplicate.as_str(), "DUPLICATE");
        assert_eq!(ErrorCode::MissingEntityId.as_str(), "MISSING_ENTITY_ID");
    }

    #[test]
    fn service_error_preserves_repository_code() {
        let repo_err = RepositoryError::not_found("Entity not found")
            .with_context("entity_id", "abc")
            .with_context("tenant_id", "tenant-a");
        let svc_err = ServiceError::from_repository("get_entity", repo_err);

        assert_eq!(svc_err.code, ErrorCode::NotFound);
        assert_eq!(svc_err.entity_id.as_deref(), Some("abc"));
        assert_eq!(svc_err.tenant_id.as_deref(), Some("tenant-a"));
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = ExchangeError::from(ValidationError::new("bad input"));
        assert!(!err.is_retryable());

        let err = ExchangeError::from(ServiceError::internal("boom", "op"));
        assert!(err.is_retryable());
    }

    #[test]
    fn error_code_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::ConstraintViolation).unwrap();
        assert_eq!(json, "\"CONSTRAINT_VIOLATION\"");
        let back: ErrorCode = serde_json::from_str("\"DATABASE_ERROR\"").unwrap();
        assert_eq!(back, ErrorCode::DatabaseError);
    }
}
