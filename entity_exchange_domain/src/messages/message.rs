// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Message Envelope
//!
//! The standardized, in-flight message format the pipeline passes between
//! processors. Messages carry an entity reference, the payload under
//! processing, open metadata and routing bags, and the retry budget owned by
//! the message itself.
//!
//! ## Wire Format
//!
//! Messages serialize to the JSON shape fixed by the external interface
//! contract: snake_case field names, lowercase message type labels, RFC 3339
//! timestamps. `message_id` and `correlation_id` are generated when absent
//! and preserved across hops, so deserializing a partial map from an untyped
//! transport always yields a fully identified message.
//!
//! The typed form is canonical; transports that deal in untyped maps convert
//! through [`Message::from_value`] / [`Message::to_value`] exactly once at
//! the boundary.
//!
//! ```json
//! {
//!   "message_id": "a2f1…",
//!   "correlation_id": "9c44…",
//!   "message_type": "entity_processing",
//!   "entity_reference": {
//!     "entity_id": null,
//!     "external_id": "ORD-1",
//!     "canonical_type": "order",
//!     "source": "shopify",
//!     "tenant_id": "tenant-a",
//!     "version": null
//!   },
//!   "payload": {"a": 1},
//!   "metadata": {},
//!   "routing_info": {},
//!   "retry_count": 0,
//!   "max_retries": 3,
//!   "created_at": "2025-06-01T12:00:00Z",
//!   "processed_at": null
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ErrorCode, ValidationError};
use crate::JsonMap;

/// Types of messages that can flow through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Processing entity data.
    EntityProcessing,
    /// Pipeline control signals.
    ControlMessage,
    /// Error notifications.
    ErrorMessage,
    /// Health check signals.
    Heartbeat,
    /// Performance metrics.
    Metrics,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::EntityProcessing
    }
}

/// Reference to an entity without carrying the full entity data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReference {
    /// Internal entity id, when the entity already exists.
    #[serde(default)]
    pub entity_id: Option<String>,
    /// External identifier from the source system.
    pub external_id: String,
    /// Type of canonical data (e.g. `order`, `customer`).
    pub canonical_type: String,
    /// Source system identifier.
    pub source: String,
    /// Tenant identifier for multi-tenant isolation.
    pub tenant_id: String,
    /// Entity version, when the entity already exists.
    #[serde(default)]
    pub version: Option<i64>,
}

fn generated_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_max_retries() -> u32 {
    3
}

/// Standardized message format for processor pipeline communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message; generated when absent.
    #[serde(default = "generated_id")]
    pub message_id: String,

    /// Correlation id for tracking across pipeline stages; generated when
    /// absent and preserved across hops.
    #[serde(default = "generated_id")]
    pub correlation_id: String,

    #[serde(default)]
    pub message_type: MessageType,

    /// Reference to the entity being processed.
    pub entity_reference: EntityReference,

    /// The actual data being processed.
    #[serde(default)]
    pub payload: JsonMap,

    /// Processing metadata and context information.
    #[serde(default)]
    pub metadata: JsonMap,

    /// Routing instructions for pipeline stages.
    #[serde(default)]
    pub routing_info: JsonMap,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Creates a message for entity processing.
    pub fn entity_message(
        external_id: impl Into<String>,
        canonical_type: impl Into<String>,
        source: impl Into<String>,
        tenant_id: impl Into<String>,
        payload: JsonMap,
    ) -> Self {
        Message {
            message_id: generated_id(),
            correlation_id: generated_id(),
            message_type: MessageType::EntityProcessing,
            entity_reference: EntityReference {
                entity_id: None,
                external_id: external_id.into(),
                canonical_type: canonical_type.into(),
                source: source.into(),
                tenant_id: tenant_id.into(),
                version: None,
            },
            payload,
            metadata: JsonMap::new(),
            routing_info: JsonMap::new(),
            retry_count: 0,
            max_retries: default_max_retries(),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Creates a control message for pipeline management. The command rides
    /// in the payload under the `command` key.
    pub fn control_message(command: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        let command = command.into();
        let mut payload = JsonMap::new();
        payload.insert("command".to_string(), Value::String(command.clone()));
        let mut metadata = JsonMap::new();
        metadata.insert("command".to_string(), Value::String(command.clone()));

        Message {
            message_id: generated_id(),
            correlation_id: generated_id(),
            message_type: MessageType::ControlMessage,
            entity_reference: EntityReference {
                entity_id: None,
                external_id: format!("control-{}", command),
                canonical_type: "control".to_string(),
                source: "system".to_string(),
                tenant_id: tenant_id.into(),
                version: None,
            },
            payload,
            metadata,
            routing_info: JsonMap::new(),
            retry_count: 0,
            max_retries: default_max_retries(),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Sets the existing entity id and version on the reference.
    pub fn with_entity(mut self, entity_id: impl Into<String>, version: Option<i64>) -> Self {
        self.entity_reference.entity_id = Some(entity_id.into());
        self.entity_reference.version = version;
        self
    }

    /// Overrides the correlation id (preserving one from an upstream hop).
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Marks the message as processed with the current timestamp.
    pub fn mark_processed(&mut self) {
        self.processed_at = Some(Utc::now());
    }

    /// Increments the retry count after failed processing.
    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Whether the message still has retry budget left.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn add_routing_info(&mut self, key: impl Into<String>, value: Value) {
        self.routing_info.insert(key.into(), value);
    }

    /// Converts an untyped map into a typed message. The single conversion
    /// point for transports that serialize to plain JSON objects.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| {
            ValidationError::with_code(
                ErrorCode::InvalidMessage,
                format!("Malformed message: {}", e),
            )
        })
    }

    /// Converts this message back into an untyped map.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("Message serialization is infallible")
    }
}
