// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Duplicate Detection Result
//!
//! The outcome of a duplicate-detection pass over incoming content. Results
//! are attached to entity attributes under the `duplicate_detection` key, so
//! operators can see why an entity was classified the way it was, and are
//! mergeable when several detection passes run over the lifetime of an
//! entity.
//!
//! The detection service itself lives in the application layer (it needs the
//! entity repository); this module owns the result model and its merge
//! semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, ValidationError};
use crate::JsonMap;

/// Result of a duplicate detection analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateDetectionResult {
    pub is_duplicate: bool,
    /// Classification confidence, 0-100.
    pub confidence: u8,
    /// Classification label; the built-in reasons are the `REASON_*`
    /// constants, custom detectors may introduce their own.
    pub reason: String,
    #[serde(default)]
    pub similar_entity_ids: Vec<String>,
    #[serde(default)]
    pub similar_entity_external_ids: Vec<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Set when identical content arrived under a different external id.
    #[serde(default)]
    pub is_suspicious: bool,
    #[serde(default)]
    pub metadata: JsonMap,
    #[serde(default = "Utc::now")]
    pub detection_timestamp: DateTime<Utc>,
}

impl DuplicateDetectionResult {
    /// Content never seen before.
    pub const REASON_NEW: &'static str = "NEW";
    /// Same content under the same external id: a new version.
    pub const REASON_NEW_VERSION: &'static str = "NEW_VERSION";
    /// Same content under a different external id: suspicious.
    pub const REASON_SAME_SOURCE_CONTENT_MATCH: &'static str = "SAME_SOURCE_CONTENT_MATCH";
    /// Detection itself failed; the caller decides fail-open or fail-closed.
    pub const REASON_DETECTION_FAILED: &'static str = "DETECTION_FAILED";

    /// Result for content with no match: `NEW`, confidence 100.
    pub fn new_content(content_hash: impl Into<String>) -> Self {
        DuplicateDetectionResult {
            is_duplicate: false,
            confidence: 100,
            reason: Self::REASON_NEW.to_string(),
            similar_entity_ids: Vec::new(),
            similar_entity_external_ids: Vec::new(),
            content_hash: Some(content_hash.into()),
            is_suspicious: false,
            metadata: JsonMap::new(),
            detection_timestamp: Utc::now(),
        }
    }

    /// Result for a content match under the same external id: `NEW_VERSION`,
    /// confidence 90, not suspicious.
    pub fn new_version(
        content_hash: impl Into<String>,
        similar_entity_id: impl Into<String>,
        similar_external_id: impl Into<String>,
    ) -> Self {
        DuplicateDetectionResult {
            is_duplicate: true,
            confidence: 90,
            reason: Self::REASON_NEW_VERSION.to_string(),
            similar_entity_ids: vec![similar_entity_id.into()],
            similar_entity_external_ids: vec![similar_external_id.into()],
            content_hash: Some(content_hash.into()),
            is_suspicious: false,
            metadata: JsonMap::new(),
            detection_timestamp: Utc::now(),
        }
    }

    /// Result for a content match under a different external id:
    /// `SAME_SOURCE_CONTENT_MATCH`, confidence 90, suspicious.
    pub fn same_source_content_match(
        content_hash: impl Into<String>,
        similar_entity_id: impl Into<String>,
        similar_external_id: impl Into<String>,
    ) -> Self {
        DuplicateDetectionResult {
            is_duplicate: true,
            confidence: 90,
            reason: Self::REASON_SAME_SOURCE_CONTENT_MATCH.to_string(),
            similar_entity_ids: vec![similar_entity_id.into()],
            similar_entity_external_ids: vec![similar_external_id.into()],
            content_hash: Some(content_hash.into()),
            is_suspicious: true,
            metadata: JsonMap::new(),
            detection_timestamp: Utc::now(),
        }
    }

    /// Result synthesized when detection raises: `DETECTION_FAILED`,
    /// confidence 0, not a duplicate; the failure rides in the metadata.
    pub fn detection_failed(error: impl Into<String>) -> Self {
        let mut metadata = JsonMap::new();
        metadata.insert("error".to_string(), Value::String(error.into()));
        DuplicateDetectionResult {
            is_duplicate: false,
            confidence: 0,
            reason: Self::REASON_DETECTION_FAILED.to_string(),
            similar_entity_ids: Vec::new(),
            similar_entity_external_ids: Vec::new(),
            content_hash: None,
            is_suspicious: false,
            metadata,
            detection_timestamp: Utc::now(),
        }
    }

    /// Merges two detection results.
    ///
    /// The higher-confidence result wins as the base; similar-entity lists
    /// are unioned (order preserved, duplicates dropped) and metadata maps
    /// are merged with `other` winning on key conflicts.
    pub fn merge_with(&self, other: &DuplicateDetectionResult) -> DuplicateDetectionResult {
        let (base, secondary) = if other.confidence > self.confidence {
            (other, self)
        } else {
            (self, other)
        };

        let mut merged = base.clone();

        for id in &secondary.similar_entity_ids {
            if !merged.similar_entity_ids.contains(id) {
                merged.similar_entity_ids.push(id.clone());
            }
        }
        for id in &secondary.similar_entity_external_ids {
            if !merged.similar_entity_external_ids.contains(id) {
                merged.similar_entity_external_ids.push(id.clone());
            }
        }

        let mut metadata = self.metadata.clone();
        for (key, value) in &other.metadata {
            metadata.insert(key.clone(), value.clone());
        }
        merged.metadata = metadata;

        merged
    }

    /// Serializes this result into the attribute-bag representation.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("DuplicateDetectionResult serialization is infallible")
    }

    /// Deserializes a result from its attribute-bag representation.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            ValidationError::with_code(
                ErrorCode::InvalidData,
                format!("Malformed duplicate detection result: {}", e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_content_classification() {
        let result = DuplicateDetectionResult::new_content("abc");
        assert!(!result.is_duplicate);
        assert_eq!(result.confidence, 100);
        assert_eq!(result.reason, DuplicateDetectionResult::REASON_NEW);
        assert!(!result.is_suspicious);
    }

    #[test]
    fn same_source_match_is_suspicious() {
        let result = DuplicateDetectionResult::same_source_content_match("abc", "id-1", "ORD-1");
        assert!(result.is_duplicate);
        assert_eq!(result.confidence, 90);
        assert!(result.is_suspicious);
        assert_eq!(result.similar_entity_ids, vec!["id-1"]);
    }

    #[test]
    fn merge_keeps_higher_confidence_base() {
        let mut low = DuplicateDetectionResult::detection_failed("boom");
        low.similar_entity_ids.push("entity-1".to_string());
        low.metadata.insert("source".to_string(), json!("original"));

        let mut high = DuplicateDetectionResult::new_version("abc", "entity-2", "ext-2");
        high.metadata.insert("source".to_string(), json!("better"));

        let merged = low.merge_with(&high);
        assert_eq!(merged.confidence, 90);
        assert_eq!(merged.reason, DuplicateDetectionResult::REASON_NEW_VERSION);
        assert!(merged.similar_entity_ids.contains(&"entity-1".to_string()));
        assert!(merged.similar_entity_ids.contains(&"entity-2".to_string()));
        // Right side wins on metadata conflicts.
        assert_eq!(merged.metadata["source"], json!("better"));
    }

    #[test]
    fn merge_metadata_is_right_biased_regardless_of_base() {
        let mut high = DuplicateDetectionResult::new_version("abc", "entity-1", "ext-1");
        high.metadata.insert("primary".to_string(), json!("value1"));

        let mut low = DuplicateDetectionResult::detection_failed("boom");
        low.metadata.insert("secondary".to_string(), json!("value2"));

        let merged = high.merge_with(&low);
        assert_eq!(merged.confidence, 90);
        assert_eq!(merged.metadata["primary"], json!("value1"));
        assert_eq!(merged.metadata["secondary"], json!("value2"));
    }

    #[test]
    fn attribute_bag_round_trip() {
        let original = DuplicateDetectionResult::same_source_content_match("hash", "id", "ext");
        let restored = DuplicateDetectionResult::from_value(&original.to_value()).unwrap();
        assert_eq!(restored, original);
    }
}
