// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Port
//!
//! The single interface all processors implement. There are no separate
//! source/intermediate/terminal processor types: the specific behavior is
//! determined by the implementation and its [`ProcessorConfig`], not by
//! artificial type constraints.
//!
//! A processor becomes a *source* processor by being configured with
//! `is_source_processor` **and** overriding [`Processor::to_canonical`] to
//! return canonical content; the processor handler then persists that
//! content through the processing service after a successful run.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExchangeError;
use crate::messages::{Message, ProcessorResult};
use crate::JsonMap;

/// Unified interface for all processors in the pipeline.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Processes a message and returns the result with routing information.
    ///
    /// This is the single method all processors must implement. Processors
    /// can create or update entities, transform payloads, make routing
    /// decisions, or terminate a chain. Errors propagate as
    /// [`ExchangeError`]; the handler classifies them into result codes and
    /// retry decisions.
    async fn process(&self, message: &Message) -> Result<ProcessorResult, ExchangeError>;

    /// Validates that a message can be processed by this processor.
    ///
    /// The default accepts all messages.
    fn validate_message(&self, _message: &Message) -> bool {
        true
    }

    /// Determines whether processing can be retried after an error.
    ///
    /// The default refuses retries for validation errors (they will not
    /// succeed on a second attempt) and allows everything else.
    fn can_retry(&self, error: &ExchangeError) -> bool {
        error.is_retryable()
    }

    /// Processor metadata for monitoring and debugging.
    fn processor_info(&self) -> JsonMap {
        let mut info = JsonMap::new();
        info.insert(
            "processor_type".to_string(),
            Value::String(std::any::type_name::<Self>().to_string()),
        );
        info
    }

    /// Transforms external payload data into canonical content.
    ///
    /// Returning `Some` marks this processor as a canonicalizing source:
    /// after a successful run the handler hashes and persists the canonical
    /// content. The default returns `None` (no persistence).
    fn to_canonical(
        &self,
        _external_data: &JsonMap,
        _metadata: &JsonMap,
    ) -> Option<Result<Value, ExchangeError>> {
        None
    }
}
