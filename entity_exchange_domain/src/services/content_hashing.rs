// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content Hashing
//!
//! Deterministic content fingerprints for duplicate detection and entity
//! versioning. The fingerprint is computed by serializing canonical content
//! to canonical JSON (object keys sorted, no insignificant whitespace),
//! applying the configured field inclusion/exclusion lists, and hashing the
//! result with the configured algorithm (sha-256 hex by default).
//!
//! Two canonical payloads that differ only in key order or formatting hash
//! identically, which is what makes content-hash duplicate detection and
//! idempotent reprocessing work.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;

/// Supported fingerprint algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

/// Configuration for content hash calculation.
///
/// `fields_to_include`, when set, restricts hashing to the listed top-level
/// fields; `exclude_fields` removes top-level fields after inclusion is
/// applied. Both operate on the top level of object payloads only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HashConfig {
    #[serde(default)]
    pub fields_to_include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_fields: Vec<String>,
    #[serde(default)]
    pub algorithm: HashAlgorithm,
}

impl HashConfig {
    /// Restricts hashing to the given top-level fields.
    pub fn including<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HashConfig {
            fields_to_include: Some(fields.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Excludes the given top-level fields from hashing.
    pub fn excluding<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HashConfig {
            exclude_fields: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// Serializes a JSON value to its canonical form: object keys sorted, no
/// insignificant whitespace.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).expect("string serialization is infallible"),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut tree = BTreeMap::new();
            for (k, v) in map {
                tree.insert(k, to_canonical_json(v));
            }
            let items: Vec<String> = tree
                .into_iter()
                .map(|(k, v)| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(&k).expect("key serialization is infallible"),
                        v
                    )
                })
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

/// Applies the field inclusion/exclusion lists of a hash configuration to a
/// top-level object payload. Non-object payloads pass through untouched.
fn apply_field_filters(data: &Value, config: &HashConfig) -> Value {
    let Value::Object(map) = data else {
        return data.clone();
    };

    let mut filtered = serde_json::Map::new();
    for (key, value) in map {
        if let Some(included) = &config.fields_to_include {
            if !included.iter().any(|f| f == key) {
                continue;
            }
        }
        if config.exclude_fields.iter().any(|f| f == key) {
            continue;
        }
        filtered.insert(key.clone(), value.clone());
    }
    Value::Object(filtered)
}

/// Computes the content fingerprint of canonical content.
pub fn calculate_content_hash(data: &Value, config: Option<&HashConfig>) -> String {
    let default_config = HashConfig::default();
    let config = config.unwrap_or(&default_config);

    let filtered = apply_field_filters(data, config);
    let canonical = to_canonical_json(&filtered);

    match config.algorithm {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(canonical.as_bytes())),
        HashAlgorithm::Sha512 => hex::encode(Sha512::digest(canonical.as_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_object_keys() {
        let val = json!({ "b": 2, "a": 1 });
        assert_eq!(to_canonical_json(&val), "{\"a\":1,\"b\":2}");
    }

    #[test]
    fn canonical_json_handles_nesting() {
        let val = json!({ "z": [ { "y": "yes" }, null ], "a": { "x": 10 } });
        assert_eq!(
            to_canonical_json(&val),
            "{\"a\":{\"x\":10},\"z\":[{\"y\":\"yes\"},null]}"
        );
    }

    #[test]
    fn hash_is_independent_of_key_order() {
        let a = json!({ "order_id": "ORD-1", "total": 99.5 });
        let b = json!({ "total": 99.5, "order_id": "ORD-1" });
        assert_eq!(
            calculate_content_hash(&a, None),
            calculate_content_hash(&b, None)
        );
    }

    #[test]
    fn excluded_fields_do_not_affect_the_hash() {
        let config = HashConfig::excluding(["total_amount"]);
        let a = json!({ "order_id": "ORD-1", "total_amount": 99.5 });
        let b = json!({ "order_id": "ORD-1", "total_amount": 10.0 });
        assert_eq!(
            calculate_content_hash(&a, Some(&config)),
            calculate_content_hash(&b, Some(&config))
        );
    }

    #[test]
    fn included_fields_restrict_the_hash() {
        let config = HashConfig::including(["order_id"]);
        let a = json!({ "order_id": "ORD-1", "customer": "John" });
        let b = json!({ "order_id": "ORD-1", "customer": "Jane" });
        assert_eq!(
            calculate_content_hash(&a, Some(&config)),
            calculate_content_hash(&b, Some(&config))
        );
    }

    #[test]
    fn algorithms_produce_distinct_digests() {
        let data = json!({ "a": 1 });
        let sha256 = calculate_content_hash(&data, None);
        let sha512 = calculate_content_hash(
            &data,
            Some(&HashConfig::default().with_algorithm(HashAlgorithm::Sha512)),
        );
        assert_eq!(sha256.len(), 64);
        assert_eq!(sha512.len(), 128);
    }

    proptest! {
        #[test]
        fn hashing_is_deterministic(keys in proptest::collection::vec("[a-z]{1,8}", 0..8)) {
            let map: serde_json::Map<String, Value> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), json!(i)))
                .collect();
            let value = Value::Object(map);
            prop_assert_eq!(
                calculate_content_hash(&value, None),
                calculate_content_hash(&value, None)
            );
        }
    }
}
