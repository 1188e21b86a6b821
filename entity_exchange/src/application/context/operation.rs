// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Operation Tracing
//!
//! Enter/exit/duration tracing for service operations. Every public service
//! method opens an [`Operation`] guard; entry is logged at debug with the
//! operation name and active tenant. On the error path the service records
//! the failure with [`Operation::fail`] before propagating, and the guard's
//! drop then logs the exit at warning with the error code and elapsed
//! milliseconds; otherwise the exit is logged at debug. Because the exit
//! log runs on drop, early returns still produce it.

use std::time::Instant;

use entity_exchange_domain::{ErrorCode, TenantContext};
use tracing::{debug, warn};

/// Guard tracing one service operation.
pub struct Operation {
    name: &'static str,
    tenant_id: Option<String>,
    started: Instant,
    error_code: Option<ErrorCode>,
}

impl Operation {
    /// Starts an operation, logging entry with the active tenant.
    pub fn start(name: &'static str, context: &TenantContext) -> Self {
        let tenant_id = context.current_tenant_id();
        debug!(operation = name, tenant_id = tenant_id.as_deref(), "Operation started");
        Operation {
            name,
            tenant_id,
            started: Instant::now(),
            error_code: None,
        }
    }

    /// Records that the operation failed with the given code. The exit log
    /// emitted on drop switches to warning and carries the code.
    pub fn fail(&mut self, code: ErrorCode) {
        self.error_code = Some(code);
    }

    /// Elapsed time since the operation started, in milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        match self.error_code {
            Some(code) => warn!(
                operation = self.name,
                tenant_id = self.tenant_id.as_deref(),
                elapsed_ms = self.elapsed_ms() as u64,
                error_code = %code,
                "Operation failed"
            ),
            None => debug!(
                operation = self.name,
                tenant_id = self.tenant_id.as_deref(),
                elapsed_ms = self.elapsed_ms() as u64,
                "Operation finished"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_tracks_elapsed_time() {
        let context = TenantContext::new();
        context.set_current_tenant("tenant-a").unwrap();

        let op = Operation::start("test_operation", &context);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(op.elapsed_ms() >= 5);
    }

    #[test]
    fn failed_operations_carry_their_code_to_the_exit_log() {
        let context = TenantContext::new();

        let mut op = Operation::start("test_operation", &context);
        op.fail(ErrorCode::NotFound);
        assert_eq!(op.error_code, Some(ErrorCode::NotFound));
        // Drop emits the warning-level exit log.
    }
}
