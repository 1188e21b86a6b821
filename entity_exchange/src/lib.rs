// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity Exchange
//!
//! Application and infrastructure layers of the multi-tenant entity
//! exchange core. The crate is a library meant to be embedded inside a
//! serverless or worker-pool host: the host owns queue polling, dispatch
//! and retries; this crate owns everything between receiving a message and
//! returning a processing result.
//!
//! ## Typical Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use entity_exchange::application::handler::ProcessorFactory;
//! use entity_exchange::infrastructure::repositories::schema;
//! use entity_exchange_domain::{Message, Processor, ProcessorConfig, TenantContext};
//!
//! # async fn example(processor: Arc<dyn Processor>) -> Result<(), Box<dyn std::error::Error>> {
//! let pool = schema::initialize_database("sqlite://exchange.db").await?;
//!
//! // One context + factory per logical invocation.
//! let context = TenantContext::new();
//! let factory = ProcessorFactory::new(pool, context);
//! let handler = factory.create_handler(processor, ProcessorConfig::new("order-mapper"));
//!
//! let mut message = Message::entity_message(
//!     "ORD-1", "order", "shopify", "tenant-a", Default::default(),
//! );
//! let result = handler.execute(&mut message).await;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! - [`application`] - tenant-scoped services, the processor handler and
//!   factory, operation tracing
//! - [`infrastructure`] - SQLite repository adapters, schema management,
//!   database configuration, observability helpers
//!
//! The domain types (entities, message model, error taxonomy, ports) live
//! in the `entity-exchange-domain` crate and are re-exported by it.

pub mod application;
pub mod infrastructure;

// Re-export the service surface hosts wire together
pub use application::handler::{ProcessorFactory, ProcessorHandler};
pub use application::services::{
    DuplicateDetectionService, EntityService, ProcessingErrorService, ProcessingOutcome,
    ProcessingService, StateTrackingService, TenantService,
};
