// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The canonical message envelope and processor result types exchanged
//! between the host, the processor handler, and user processors.

mod message;
mod processor_result;

pub use message::{EntityReference, Message, MessageType};
pub use processor_result::{ProcessingStatus, ProcessorResult};
