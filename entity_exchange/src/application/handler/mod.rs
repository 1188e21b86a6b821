// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The processor handler and factory: execution, persistence, state
//! tracking and error capture around any user processor.

mod processor_factory;
mod processor_handler;

pub use processor_factory::ProcessorFactory;
pub use processor_handler::{retry_delay_seconds, ProcessorHandler};
