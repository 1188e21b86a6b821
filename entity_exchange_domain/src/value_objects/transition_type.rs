// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Transition type classification for the state ledger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ValidationError};

/// Classification of a state transition. Closed set, unlike state labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionType {
    Normal,
    Error,
    Recovery,
    Manual,
    Timeout,
    Retry,
}

impl TransitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionType::Normal => "NORMAL",
            TransitionType::Error => "ERROR",
            TransitionType::Recovery => "RECOVERY",
            TransitionType::Manual => "MANUAL",
            TransitionType::Timeout => "TIMEOUT",
            TransitionType::Retry => "RETRY",
        }
    }
}

impl Default for TransitionType {
    fn default() -> Self {
        TransitionType::Normal
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(TransitionType::Normal),
            "ERROR" => Ok(TransitionType::Error),
            "RECOVERY" => Ok(TransitionType::Recovery),
            "MANUAL" => Ok(TransitionType::Manual),
            "TIMEOUT" => Ok(TransitionType::Timeout),
            "RETRY" => Ok(TransitionType::Retry),
            other => Err(ValidationError::with_code(
                ErrorCode::InvalidData,
                format!("Unknown transition type: {}", other),
            )
            .for_field("transition_type", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for t in [
            TransitionType::Normal,
            TransitionType::Error,
            TransitionType::Recovery,
            TransitionType::Manual,
            TransitionType::Timeout,
            TransitionType::Retry,
        ] {
            assert_eq!(t.as_str().parse::<TransitionType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_labels_are_rejected() {
        let err = "SIDEWAYS".parse::<TransitionType>().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidData);
    }
}
