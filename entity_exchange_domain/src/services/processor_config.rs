// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Configuration
//!
//! Controls processing behavior per processor: duplicate detection,
//! versioning strategy, attribute handling, state tracking, and an open
//! `custom_config` bag for processor-specific options.

use serde::{Deserialize, Serialize};

use crate::services::content_hashing::HashConfig;
use crate::JsonMap;

/// Strategy used for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDetectionStrategy {
    /// Content-hash lookup against the entity store (the default).
    ContentHash,
    /// Detection delegated to a processor-specific mechanism.
    Custom,
}

impl Default for DuplicateDetectionStrategy {
    fn default() -> Self {
        DuplicateDetectionStrategy::ContentHash
    }
}

fn default_true() -> bool {
    true
}

fn default_processor_version() -> String {
    "1.0.0".to_string()
}

fn default_max_similar_entities() -> usize {
    10
}

/// Configuration for processor behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Name of the processor, used as the actor for tracking and logging.
    pub processor_name: String,

    #[serde(default = "default_processor_version")]
    pub processor_version: String,

    /// Whether to perform duplicate detection before persistence.
    #[serde(default = "default_true")]
    pub enable_duplicate_detection: bool,

    #[serde(default)]
    pub duplicate_detection_strategy: DuplicateDetectionStrategy,

    /// Configuration for content hash calculation.
    #[serde(default)]
    pub hash_config: Option<HashConfig>,

    /// Always create a new version regardless of content changes.
    #[serde(default)]
    pub force_new_version: bool,

    /// Whether this processor creates entities (source) or consumes
    /// existing ones.
    #[serde(default = "default_true")]
    pub is_source_processor: bool,

    /// Whether this processor terminates a processing chain.
    #[serde(default)]
    pub is_terminal_processor: bool,

    /// Whether to update entity attributes when duplicates are found.
    #[serde(default = "default_true")]
    pub update_attributes_on_duplicate: bool,

    /// Attribute keys whose existing values must not be overwritten on
    /// merge.
    #[serde(default)]
    pub preserve_attribute_keys: Vec<String>,

    /// Whether to record state transitions for entity processing.
    #[serde(default)]
    pub enable_state_tracking: bool,

    /// Whether a duplicate-detection failure fails processing (fail-closed)
    /// or degrades to a `DETECTION_FAILED` result (fail-open, the default).
    #[serde(default)]
    pub fail_on_duplicate_detection_error: bool,

    /// Maximum number of similar entities to track in detection results.
    #[serde(default = "default_max_similar_entities")]
    pub max_similar_entities: usize,

    /// Pipeline stage label for observability.
    #[serde(default)]
    pub processing_stage: Option<String>,

    /// Processor-specific configuration.
    #[serde(default)]
    pub custom_config: JsonMap,
}

impl ProcessorConfig {
    /// Creates a configuration with the given processor name and defaults
    /// for everything else (source processor, detection enabled, state
    /// tracking disabled).
    pub fn new(processor_name: impl Into<String>) -> Self {
        ProcessorConfig {
            processor_name: processor_name.into(),
            processor_version: default_processor_version(),
            enable_duplicate_detection: true,
            duplicate_detection_strategy: DuplicateDetectionStrategy::default(),
            hash_config: None,
            force_new_version: false,
            is_source_processor: true,
            is_terminal_processor: false,
            update_attributes_on_duplicate: true,
            preserve_attribute_keys: Vec::new(),
            enable_state_tracking: false,
            fail_on_duplicate_detection_error: false,
            max_similar_entities: default_max_similar_entities(),
            processing_stage: None,
            custom_config: JsonMap::new(),
        }
    }

    /// Marks this processor as a non-source (consumes existing entities).
    pub fn non_source(mut self) -> Self {
        self.is_source_processor = false;
        self
    }

    /// Enables state transition recording.
    pub fn with_state_tracking(mut self) -> Self {
        self.enable_state_tracking = true;
        self
    }

    /// Disables duplicate detection.
    pub fn without_duplicate_detection(mut self) -> Self {
        self.enable_duplicate_detection = false;
        self
    }

    pub fn with_hash_config(mut self, hash_config: HashConfig) -> Self {
        self.hash_config = Some(hash_config);
        self
    }

    pub fn with_processing_stage(mut self, stage: impl Into<String>) -> Self {
        self.processing_stage = Some(stage.into());
        self
    }
}
