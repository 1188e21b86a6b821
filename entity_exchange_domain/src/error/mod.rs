// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Error types for the entity exchange domain.

mod exchange_error;

pub use exchange_error::{
    ErrorCode, ExchangeError, RepositoryError, ServiceError, ValidationError,
};
