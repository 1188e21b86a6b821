// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity Attribute Builder
//!
//! Builds and merges the open attribute bag stored on every entity. The bag
//! has a stable shape: a documented set of reserved top-level keys
//! (`duplicate_detection`, `source_metadata`, `processor_execution`) plus
//! arbitrary tenant keys carried verbatim.

use chrono::Utc;
use serde_json::Value;

use crate::services::duplicate_detection::DuplicateDetectionResult;
use crate::JsonMap;

/// Reserved key for the latest duplicate-detection result.
pub const KEY_DUPLICATE_DETECTION: &str = "duplicate_detection";
/// Reserved key for metadata captured from the source system.
pub const KEY_SOURCE_METADATA: &str = "source_metadata";
/// Reserved key for processor execution context.
pub const KEY_PROCESSOR_EXECUTION: &str = "processor_execution";

/// Stateless builder for entity attribute bags.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityAttributeBuilder;

impl EntityAttributeBuilder {
    pub fn new() -> Self {
        EntityAttributeBuilder
    }

    /// Builds a fresh attribute bag for an entity version.
    ///
    /// Custom attributes are copied in verbatim first, then the reserved
    /// keys are written, so reserved keys always reflect framework state
    /// even if a caller passed colliding custom keys.
    pub fn build(
        &self,
        detection_result: Option<&DuplicateDetectionResult>,
        custom_attributes: Option<&JsonMap>,
        processor_name: &str,
        source_metadata: Option<&JsonMap>,
        content_changed: bool,
    ) -> JsonMap {
        let mut attributes = JsonMap::new();

        if let Some(custom) = custom_attributes {
            for (key, value) in custom {
                attributes.insert(key.clone(), value.clone());
            }
        }

        if let Some(result) = detection_result {
            attributes.insert(KEY_DUPLICATE_DETECTION.to_string(), result.to_value());
        }

        if let Some(metadata) = source_metadata {
            attributes.insert(
                KEY_SOURCE_METADATA.to_string(),
                Value::Object(metadata.clone()),
            );
        }

        // Caller-provided execution context (message ids, durations) is kept
        // and the framework fields are stamped on top.
        let mut execution = match attributes.get(KEY_PROCESSOR_EXECUTION) {
            Some(Value::Object(existing)) => existing.clone(),
            _ => JsonMap::new(),
        };
        execution.insert(
            "processor_name".to_string(),
            Value::String(processor_name.to_string()),
        );
        execution.insert("content_changed".to_string(), Value::Bool(content_changed));
        execution.insert(
            "processed_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        attributes.insert(KEY_PROCESSOR_EXECUTION.to_string(), Value::Object(execution));

        attributes
    }

    /// Shallow-merges new attributes over existing ones.
    ///
    /// Top-level keys from `new_attributes` overwrite existing values,
    /// except keys listed in `preserve_keys` whose existing values are kept.
    pub fn merge_attributes(
        &self,
        existing_attributes: &JsonMap,
        new_attributes: &JsonMap,
        preserve_keys: &[String],
    ) -> JsonMap {
        let mut merged = existing_attributes.clone();
        for (key, value) in new_attributes {
            if preserve_keys.contains(key) && existing_attributes.contains_key(key) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Replaces or merges the stored duplicate-detection result.
    ///
    /// With `merge_results` set, an existing parseable result is merged with
    /// the new one via [`DuplicateDetectionResult::merge_with`]; otherwise
    /// (or when the stored value is absent or malformed) the new result
    /// replaces it.
    pub fn update_duplicate_detection(
        &self,
        existing_attributes: &JsonMap,
        new_detection_result: &DuplicateDetectionResult,
        merge_results: bool,
    ) -> JsonMap {
        let mut updated = existing_attributes.clone();

        let stored = if merge_results {
            existing_attributes
                .get(KEY_DUPLICATE_DETECTION)
                .and_then(|value| DuplicateDetectionResult::from_value(value).ok())
        } else {
            None
        };

        let result_value = match stored {
            Some(previous) => previous.merge_with(new_detection_result).to_value(),
            None => new_detection_result.to_value(),
        };

        updated.insert(KEY_DUPLICATE_DETECTION.to_string(), result_value);
        updated
    }
}
