// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Result
//!
//! The result of every processor invocation. The host reads `success`,
//! `can_retry` and `retry_after_seconds` to decide whether and when to
//! requeue a message; `output_messages` are forwarded to downstream queues
//! only after the invocation returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;
use crate::messages::Message;
use crate::JsonMap;

/// Overall status of a processor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Success,
    PartialSuccess,
    Failure,
    Skipped,
}

/// Result returned by every processor invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorResult {
    pub status: ProcessingStatus,
    pub success: bool,

    /// Messages to forward downstream, in order.
    #[serde(default)]
    pub output_messages: Vec<Message>,

    /// Ids of entities created during this invocation.
    #[serde(default)]
    pub entities_created: Vec<String>,

    /// Ids of entities updated during this invocation.
    #[serde(default)]
    pub entities_updated: Vec<String>,

    #[serde(default)]
    pub processing_metadata: JsonMap,

    /// Human-readable failure description.
    #[serde(default)]
    pub error_message: Option<String>,

    /// Machine-readable failure code from the shared taxonomy.
    #[serde(default)]
    pub error_code: Option<ErrorCode>,

    #[serde(default)]
    pub error_details: JsonMap,

    /// Whether the host should requeue the message.
    #[serde(default)]
    pub can_retry: bool,

    /// Suggested delay before the next attempt.
    #[serde(default)]
    pub retry_after_seconds: Option<u64>,

    #[serde(default)]
    pub routing_info: JsonMap,

    #[serde(default)]
    pub processing_duration_ms: f64,

    #[serde(default)]
    pub processor_info: JsonMap,
}

impl ProcessorResult {
    /// Creates a successful result with no outputs.
    pub fn success() -> Self {
        ProcessorResult {
            status: ProcessingStatus::Success,
            success: true,
            output_messages: Vec::new(),
            entities_created: Vec::new(),
            entities_updated: Vec::new(),
            processing_metadata: JsonMap::new(),
            error_message: None,
            error_code: None,
            error_details: JsonMap::new(),
            can_retry: false,
            retry_after_seconds: None,
            routing_info: JsonMap::new(),
            processing_duration_ms: 0.0,
            processor_info: JsonMap::new(),
        }
    }

    /// Creates a skipped result (nothing to do for this message).
    pub fn skipped(reason: impl Into<String>) -> Self {
        let mut result = Self::success();
        result.status = ProcessingStatus::Skipped;
        result
            .processing_metadata
            .insert("skip_reason".to_string(), Value::String(reason.into()));
        result
    }

    /// Creates a failure result.
    pub fn failure(
        error_message: impl Into<String>,
        error_code: ErrorCode,
        can_retry: bool,
    ) -> Self {
        ProcessorResult {
            status: ProcessingStatus::Failure,
            success: false,
            output_messages: Vec::new(),
            entities_created: Vec::new(),
            entities_updated: Vec::new(),
            processing_metadata: JsonMap::new(),
            error_message: Some(error_message.into()),
            error_code: Some(error_code),
            error_details: JsonMap::new(),
            can_retry,
            retry_after_seconds: None,
            routing_info: JsonMap::new(),
            processing_duration_ms: 0.0,
            processor_info: JsonMap::new(),
        }
    }

    /// Appends an output message for downstream routing.
    pub fn with_output_message(mut self, message: Message) -> Self {
        self.output_messages.push(message);
        self
    }

    /// Adds a processing metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.processing_metadata.insert(key.into(), value);
        self
    }

    /// Adds an error detail entry.
    pub fn with_error_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.error_details.insert(key.into(), value);
        self
    }

    /// Sets the suggested retry delay.
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }

    /// Replaces the routing bag.
    pub fn with_routing_info(mut self, routing_info: JsonMap) -> Self {
        self.routing_info = routing_info;
        self
    }

    /// Marks this result for dead-letter routing.
    pub fn with_dead_letter(mut self, reason: impl Into<String>) -> Self {
        self.routing_info
            .insert("dead_letter".to_string(), Value::Bool(true));
        self.routing_info
            .insert("reason".to_string(), Value::String(reason.into()));
        self
    }
}
