// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Typed Identifier Value Objects
//!
//! ULID-based, phantom-typed identifiers for the exchange core. ULIDs are
//! lexicographically sortable by creation time, globally unique, and compact
//! (26-character Crockford Base32), which makes them good surrogate keys for
//! append-heavy tables.
//!
//! The phantom type parameter prevents mixing identifier categories at
//! compile time with zero runtime overhead: an [`EntityId`] cannot be passed
//! where a [`TransitionId`] is expected.
//!
//! Tenant identifiers are deliberately *not* modelled here: a tenant id is a
//! caller-chosen business key (a plain string), not a generated surrogate.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

use crate::error::ValidationError;

/// Marker for identifier categories.
///
/// Implementations only provide the category label used in error messages.
pub trait IdCategory {
    const LABEL: &'static str;
}

/// Generic ULID identifier parameterized by category.
pub struct Id<C: IdCategory> {
    value: Ulid,
    _category: PhantomData<C>,
}

impl<C: IdCategory> Id<C> {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Id {
            value: Ulid::new(),
            _category: PhantomData,
        }
    }

    /// Parses an identifier from its canonical 26-character string form.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Ulid::from_string(input)
            .map(|value| Id {
                value,
                _category: PhantomData,
            })
            .map_err(|e| {
                ValidationError::new(format!("Invalid {} id: {}", C::LABEL, e))
                    .for_field("id", input)
            })
    }

    /// Returns the underlying ULID.
    pub fn as_ulid(&self) -> Ulid {
        self.value
    }
}

impl<C: IdCategory> Default for Id<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: IdCategory> Clone for Id<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: IdCategory> Copy for Id<C> {}

impl<C: IdCategory> PartialEq for Id<C> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<C: IdCategory> Eq for Id<C> {}

impl<C: IdCategory> PartialOrd for Id<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: IdCategory> Ord for Id<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<C: IdCategory> Hash for Id<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<C: IdCategory> fmt::Debug for Id<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", C::LABEL, self.value)
    }
}

impl<C: IdCategory> fmt::Display for Id<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<C: IdCategory> FromStr for Id<C> {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<C: IdCategory> Serialize for Id<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value.to_string())
    }
}

impl<'de, C: IdCategory> Deserialize<'de> for Id<C> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Id::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Category marker for entity identifiers.
#[derive(Debug)]
pub enum EntityIdCategory {}

impl IdCategory for EntityIdCategory {
    const LABEL: &'static str = "entity";
}

/// Category marker for state transition identifiers.
#[derive(Debug)]
pub enum TransitionIdCategory {}

impl IdCategory for TransitionIdCategory {
    const LABEL: &'static str = "state_transition";
}

/// Category marker for processing error identifiers.
#[derive(Debug)]
pub enum ErrorIdCategory {}

impl IdCategory for ErrorIdCategory {
    const LABEL: &'static str = "processing_error";
}

/// Identifier for an entity version row.
pub type EntityId = Id<EntityIdCategory>;

/// Identifier for a state transition row.
pub type TransitionId = Id<TransitionIdCategory>;

/// Identifier for a processing error row.
pub type ErrorId = Id<ErrorIdCategory>;
