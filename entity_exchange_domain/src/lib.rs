// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity Exchange Domain
//!
//! The domain layer of the multi-tenant entity exchange core: the business
//! rules for ingesting external records, assigning them stable internal
//! identities, versioning them immutably, and recording every state change
//! with full tenant isolation. It is independent of databases, runtimes and
//! transports; the application crate supplies those.
//!
//! ## Module Structure
//!
//! - [`entities`] - records with identity: [`entities::Entity`],
//!   [`entities::StateTransition`], [`entities::ProcessingError`],
//!   [`entities::Tenant`]
//! - [`value_objects`] - typed ids, state labels, transition types
//! - [`messages`] - the message envelope and processor result
//! - [`context`] - the per-invocation tenant context carrier
//! - [`error`] - the layered error system and shared code taxonomy
//! - [`repositories`] - async persistence ports the infrastructure
//!   implements
//! - [`services`] - pure domain services (content hashing, attribute
//!   building, the duplicate-detection result model) and the processor port
//!
//! ## Core Business Rules
//!
//! ### Versioning
//! - Entities are immutable; change means a new version row
//! - Versions start at 1 and increase without gaps per
//!   `(tenant, source, external_id)`
//! - Only the open attribute bag may be merged in place
//!
//! ### Tenant Isolation
//! - Every repository operation is scoped to the invocation's tenant
//! - Tenant identity travels in an explicit context value, never a process
//!   global
//!
//! ### State Ledger
//! - Transitions are append-only and totally ordered per entity by
//!   sequence number
//! - The current state of an entity is the `to_state` of its most recent
//!   transition

pub mod context;
pub mod entities;
pub mod error;
pub mod messages;
pub mod repositories;
pub mod services;
pub mod value_objects;

/// Open JSON object bag used for attributes, payloads, metadata and
/// processor data throughout the core.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

// Re-export commonly used types for convenient access
pub use context::{TenantContext, TenantScope};
pub use entities::{Entity, ProcessingError, StateTransition, Tenant, TenantConfigValue};
pub use error::{ErrorCode, ExchangeError, RepositoryError, ServiceError, ValidationError};
pub use messages::{EntityReference, Message, MessageType, ProcessingStatus, ProcessorResult};
pub use services::{
    DuplicateDetectionResult, EntityAttributeBuilder, HashConfig, Processor, ProcessorConfig,
};
pub use value_objects::{EntityId, EntityState, ErrorId, TransitionId, TransitionType};
