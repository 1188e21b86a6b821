// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Context
//!
//! The ambient, per-invocation tenant identity every repository and service
//! call is scoped by.
//!
//! ## Concurrency Contract
//!
//! A `TenantContext` is an explicit context value owned by one logical
//! invocation (one message execution). It is **not** process-global: hosts
//! create one context per invocation and wire it into the repositories and
//! services serving that invocation. Cloning the handle shares the same
//! underlying slot, which is how a service and its repositories observe the
//! same tenant; spawned child work must be given the context (or a fresh
//! one) explicitly - inheritance is never assumed.
//!
//! ## Scoped Form
//!
//! [`TenantContext::push_tenant`] returns a [`TenantScope`] guard that
//! restores the previous tenant when dropped, including during panics and
//! early returns, and nests correctly.
//!
//! ## Tenant Cache
//!
//! The context carries a small bounded cache (100 entries, FIFO eviction)
//! of tenant records keyed by tenant id, with invalidation hooks called by
//! the tenant registry on every mutation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::entities::Tenant;
use crate::error::ValidationError;

/// Maximum number of cached tenants per context.
const MAX_CACHED_TENANTS: usize = 100;

#[derive(Debug, Default)]
struct ContextState {
    current_tenant: Option<String>,
    cache: HashMap<String, Tenant>,
    cache_order: VecDeque<String>,
}

/// Per-invocation tenant identity slot with a bounded tenant cache.
#[derive(Debug, Clone, Default)]
pub struct TenantContext {
    state: Arc<Mutex<ContextState>>,
}

impl TenantContext {
    pub fn new() -> Self {
        TenantContext::default()
    }

    /// Sets the current tenant for this execution context.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION_FAILED` when the id is empty or whitespace.
    pub fn set_current_tenant(&self, tenant_id: &str) -> Result<(), ValidationError> {
        let trimmed = tenant_id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new("tenant_id must be a non-empty string"));
        }
        self.state.lock().expect("tenant context lock poisoned").current_tenant =
            Some(trimmed.to_string());
        Ok(())
    }

    /// Returns the current tenant id, if one is set.
    pub fn current_tenant_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("tenant context lock poisoned")
            .current_tenant
            .clone()
    }

    /// Returns the current tenant id or a validation failure when none is
    /// set. Repositories call this before every operation.
    pub fn require_current_tenant(&self) -> Result<String, ValidationError> {
        self.current_tenant_id()
            .ok_or_else(|| ValidationError::new("No tenant context set"))
    }

    /// Clears the current tenant from this execution context.
    pub fn clear_current_tenant(&self) {
        self.state
            .lock()
            .expect("tenant context lock poisoned")
            .current_tenant = None;
    }

    /// Pushes a tenant for a scope, returning a guard that restores the
    /// previous tenant (or clears the slot) when dropped.
    pub fn push_tenant(&self, tenant_id: &str) -> Result<TenantScope, ValidationError> {
        let previous = self.current_tenant_id();
        self.set_current_tenant(tenant_id)?;
        Ok(TenantScope {
            state: Arc::clone(&self.state),
            previous,
        })
    }

    /// Runs a closure under a tenant scope, restoring the previous tenant
    /// afterwards. The async-friendly equivalent is [`Self::push_tenant`],
    /// whose guard can be held across await points.
    pub fn with_tenant<T>(
        &self,
        tenant_id: &str,
        f: impl FnOnce() -> T,
    ) -> Result<T, ValidationError> {
        let _scope = self.push_tenant(tenant_id)?;
        Ok(f())
    }

    /// Returns the cached tenant record for the given id, if present.
    pub fn cached_tenant(&self, tenant_id: &str) -> Option<Tenant> {
        self.state
            .lock()
            .expect("tenant context lock poisoned")
            .cache
            .get(tenant_id)
            .cloned()
    }

    /// Caches a tenant record, evicting the oldest entry once the cache
    /// holds 100 tenants.
    pub fn cache_tenant(&self, tenant: Tenant) {
        let mut state = self.state.lock().expect("tenant context lock poisoned");
        let tenant_id = tenant.tenant_id().to_string();

        if !state.cache.contains_key(&tenant_id) {
            if state.cache_order.len() >= MAX_CACHED_TENANTS {
                if let Some(oldest) = state.cache_order.pop_front() {
                    state.cache.remove(&oldest);
                }
            }
            state.cache_order.push_back(tenant_id.clone());
        }
        state.cache.insert(tenant_id, tenant);
    }

    /// Clears the tenant cache: one tenant when an id is given, everything
    /// otherwise. Called by the tenant registry on every mutation.
    pub fn clear_cache(&self, tenant_id: Option<&str>) {
        let mut state = self.state.lock().expect("tenant context lock poisoned");
        match tenant_id {
            Some(id) => {
                state.cache.remove(id);
                state.cache_order.retain(|cached| cached != id);
            }
            None => {
                state.cache.clear();
                state.cache_order.clear();
            }
        }
    }
}

/// Guard restoring the previously active tenant on drop.
///
/// Restoration runs during unwinding too, so a panic inside a tenant scope
/// cannot leak one tenant's identity into the next operation on the same
/// context.
#[derive(Debug)]
pub struct TenantScope {
    state: Arc<Mutex<ContextState>>,
    previous: Option<String>,
}

impl Drop for TenantScope {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.current_tenant = self.previous.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear_round_trip() {
        let ctx = TenantContext::new();
        assert!(ctx.current_tenant_id().is_none());

        ctx.set_current_tenant("tenant-a").unwrap();
        assert_eq!(ctx.current_tenant_id().as_deref(), Some("tenant-a"));

        ctx.clear_current_tenant();
        assert!(ctx.current_tenant_id().is_none());
    }

    #[test]
    fn blank_tenant_ids_are_rejected() {
        let ctx = TenantContext::new();
        assert!(ctx.set_current_tenant("").is_err());
        assert!(ctx.set_current_tenant("   ").is_err());
    }

    #[test]
    fn tenant_ids_are_trimmed() {
        let ctx = TenantContext::new();
        ctx.set_current_tenant("  tenant-a  ").unwrap();
        assert_eq!(ctx.current_tenant_id().as_deref(), Some("tenant-a"));
    }

    #[test]
    fn scopes_restore_the_previous_tenant() {
        let ctx = TenantContext::new();
        ctx.set_current_tenant("outer").unwrap();
        {
            let _scope = ctx.push_tenant("inner").unwrap();
            assert_eq!(ctx.current_tenant_id().as_deref(), Some("inner"));
            {
                let _nested = ctx.push_tenant("innermost").unwrap();
                assert_eq!(ctx.current_tenant_id().as_deref(), Some("innermost"));
            }
            assert_eq!(ctx.current_tenant_id().as_deref(), Some("inner"));
        }
        assert_eq!(ctx.current_tenant_id().as_deref(), Some("outer"));
    }

    #[test]
    fn with_tenant_runs_under_the_scope() {
        let ctx = TenantContext::new();
        ctx.set_current_tenant("outer").unwrap();

        let observed = ctx
            .with_tenant("inner", || ctx.current_tenant_id())
            .unwrap();
        assert_eq!(observed.as_deref(), Some("inner"));
        assert_eq!(ctx.current_tenant_id().as_deref(), Some("outer"));

        assert!(ctx.with_tenant("  ", || ()).is_err());
    }

    #[test]
    fn scope_clears_when_nothing_was_set() {
        let ctx = TenantContext::new();
        {
            let _scope = ctx.push_tenant("tenant-a").unwrap();
            assert!(ctx.current_tenant_id().is_some());
        }
        assert!(ctx.current_tenant_id().is_none());
    }

    #[test]
    fn scope_restores_on_panic() {
        let ctx = TenantContext::new();
        ctx.set_current_tenant("outer").unwrap();

        let ctx_clone = ctx.clone();
        let result = std::panic::catch_unwind(move || {
            let _scope = ctx_clone.push_tenant("inner").unwrap();
            panic!("processor blew up");
        });
        assert!(result.is_err());
        assert_eq!(ctx.current_tenant_id().as_deref(), Some("outer"));
    }

    #[test]
    fn cache_evicts_fifo_at_capacity() {
        let ctx = TenantContext::new();
        for i in 0..101 {
            let tenant = Tenant::new(format!("tenant-{}", i), "Acme").unwrap();
            ctx.cache_tenant(tenant);
        }
        // The first entry is evicted, the rest remain.
        assert!(ctx.cached_tenant("tenant-0").is_none());
        assert!(ctx.cached_tenant("tenant-1").is_some());
        assert!(ctx.cached_tenant("tenant-100").is_some());
    }

    #[test]
    fn clear_cache_supports_single_and_full_invalidation() {
        let ctx = TenantContext::new();
        ctx.cache_tenant(Tenant::new("tenant-a", "Acme").unwrap());
        ctx.cache_tenant(Tenant::new("tenant-b", "Globex").unwrap());

        ctx.clear_cache(Some("tenant-a"));
        assert!(ctx.cached_tenant("tenant-a").is_none());
        assert!(ctx.cached_tenant("tenant-b").is_some());

        ctx.clear_cache(None);
        assert!(ctx.cached_tenant("tenant-b").is_none());
    }

    #[test]
    fn clones_share_the_same_slot() {
        let ctx = TenantContext::new();
        let handle = ctx.clone();
        ctx.set_current_tenant("tenant-a").unwrap();
        assert_eq!(handle.current_tenant_id().as_deref(), Some("tenant-a"));
    }
}
