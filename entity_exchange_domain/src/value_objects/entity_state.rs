// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity State Labels
//!
//! State labels for the state-transition ledger. The set is open: the known
//! lifecycle states are modelled as variants, and any other label round-trips
//! through [`EntityState::Other`] so tenant pipelines can introduce their own
//! stages without a schema change.
//!
//! Labels are stored and transmitted in SCREAMING_SNAKE_CASE string form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state of an entity as recorded in the transition ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityState {
    Received,
    Processing,
    Completed,
    Failed,
    ValidationError,
    TransformationError,
    DeliveryError,
    SystemError,
    Validated,
    Transformed,
    Enriched,
    ReadyToDeliver,
    Delivered,
    UpdateReceived,
    UpdateProcessing,
    UpdateValidated,
    UpdateDelivered,
    UpdateCompleted,
    UpdateError,
    DuplicateDetected,
    ManuallyResolved,
    OnHold,
    PendingReview,
    /// Pipeline-specific label outside the built-in set.
    Other(String),
}

impl EntityState {
    /// Returns the canonical string label for this state.
    pub fn as_str(&self) -> &str {
        match self {
            EntityState::Received => "RECEIVED",
            EntityState::Processing => "PROCESSING",
            EntityState::Completed => "COMPLETED",
            EntityState::Failed => "FAILED",
            EntityState::ValidationError => "VALIDATION_ERROR",
            EntityState::TransformationError => "TRANSFORMATION_ERROR",
            EntityState::DeliveryError => "DELIVERY_ERROR",
            EntityState::SystemError => "SYSTEM_ERROR",
            EntityState::Validated => "VALIDATED",
            EntityState::Transformed => "TRANSFORMED",
            EntityState::Enriched => "ENRICHED",
            EntityState::ReadyToDeliver => "READY_TO_DELIVER",
            EntityState::Delivered => "DELIVERED",
            EntityState::UpdateReceived => "UPDATE_RECEIVED",
            EntityState::UpdateProcessing => "UPDATE_PROCESSING",
            EntityState::UpdateValidated => "UPDATE_VALIDATED",
            EntityState::UpdateDelivered => "UPDATE_DELIVERED",
            EntityState::UpdateCompleted => "UPDATE_COMPLETED",
            EntityState::UpdateError => "UPDATE_ERROR",
            EntityState::DuplicateDetected => "DUPLICATE_DETECTED",
            EntityState::ManuallyResolved => "MANUALLY_RESOLVED",
            EntityState::OnHold => "ON_HOLD",
            EntityState::PendingReview => "PENDING_REVIEW",
            EntityState::Other(label) => label,
        }
    }

    /// Whether this state marks a terminal error.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            EntityState::Failed
                | EntityState::ValidationError
                | EntityState::TransformationError
                | EntityState::DeliveryError
                | EntityState::SystemError
                | EntityState::UpdateError
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "RECEIVED" => EntityState::Received,
            "PROCESSING" => EntityState::Processing,
            "COMPLETED" => EntityState::Completed,
            "FAILED" => EntityState::Failed,
            "VALIDATION_ERROR" => EntityState::ValidationError,
            "TRANSFORMATION_ERROR" => EntityState::TransformationError,
            "DELIVERY_ERROR" => EntityState::DeliveryError,
            "SYSTEM_ERROR" => EntityState::SystemError,
            "VALIDATED" => EntityState::Validated,
            "TRANSFORMED" => EntityState::Transformed,
            "ENRICHED" => EntityState::Enriched,
            "READY_TO_DELIVER" => EntityState::ReadyToDeliver,
            "DELIVERED" => EntityState::Delivered,
            "UPDATE_RECEIVED" => EntityState::UpdateReceived,
            "UPDATE_PROCESSING" => EntityState::UpdateProcessing,
            "UPDATE_VALIDATED" => EntityState::UpdateValidated,
            "UPDATE_DELIVERED" => EntityState::UpdateDelivered,
            "UPDATE_COMPLETED" => EntityState::UpdateCompleted,
            "UPDATE_ERROR" => EntityState::UpdateError,
            "DUPLICATE_DETECTED" => EntityState::DuplicateDetected,
            "MANUALLY_RESOLVED" => EntityState::ManuallyResolved,
            "ON_HOLD" => EntityState::OnHold,
            "PENDING_REVIEW" => EntityState::PendingReview,
            other => EntityState::Other(other.to_string()),
        })
    }
}

impl Serialize for EntityState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().expect("EntityState parsing is infallible"))
    }
}
