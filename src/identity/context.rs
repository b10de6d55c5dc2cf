//! Execution-context-local tenant identity.
//!
//! An [`IdentityContext`] is the explicit, per-task carrier of "who is
//! calling". It replaces ambient thread-local state: every API that needs
//! the caller's identity takes `&IdentityContext` as an argument.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::IdentityError;
use crate::identity::registry::TenantRegistry;
use crate::identity::TenantId;

/// Sentinel tenant substituted by [`IdentityContext::current_or_default`]
/// when no identity is bound.
pub const DEFAULT_TENANT: &str = "default";

/// A bound tenant identity. Created on bind, destroyed on unbind, never
/// persisted.
#[derive(Debug, Clone)]
pub struct TenantIdentity {
    pub tenant_id: TenantId,
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

struct BoundIdentity {
    identity: TenantIdentity,
    /// Keeps the registry's live-binding row alive; sweeps reclaim the row
    /// once this drops.
    _liveness: Arc<()>,
}

/// Per-execution-context identity carrier.
///
/// Holds at most one bound identity at a time. The binding itself is a
/// plain field; contexts are not shared, so reads take no lock. All
/// registry bookkeeping (ceilings, TTL rows, live bindings) goes through
/// the shared [`TenantRegistry`].
///
/// Dropping the context releases its registry bookkeeping.
pub struct IdentityContext {
    registry: Arc<TenantRegistry>,
    context_id: u64,
    binding: Option<BoundIdentity>,
}

impl IdentityContext {
    pub(crate) fn new(registry: Arc<TenantRegistry>, context_id: u64) -> Self {
        Self {
            registry,
            context_id,
            binding: None,
        }
    }

    /// Bind a tenant identity to this context.
    ///
    /// Fails with [`IdentityError::InvalidIdentifier`] if the id is empty
    /// or outside the safe charset, and with
    /// [`IdentityError::CapacityExceeded`] if the registry ceilings are hit
    /// even after a forced sweep. On success any previously bound identity
    /// is overwritten; on failure it is left untouched.
    pub fn bind(&mut self, tenant_id: &str) -> Result<(), IdentityError> {
        self.bind_with(tenant_id, HashMap::new())
    }

    /// [`bind`](Self::bind) with identity metadata (org name, tier, ...).
    pub fn bind_with(
        &mut self,
        tenant_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), IdentityError> {
        let tenant = TenantId::new(tenant_id)?;
        let now = Utc::now();
        let token = self.registry.bind(self.context_id, &tenant, now)?;

        let identity = TenantIdentity {
            tenant_id: tenant,
            session_id: Uuid::new_v4(),
            started_at: now,
            metadata,
        };
        debug!(
            tenant_id = %identity.tenant_id,
            session_id = %identity.session_id,
            "bound tenant identity"
        );
        self.binding = Some(BoundIdentity {
            identity,
            _liveness: token,
        });
        Ok(())
    }

    /// The bound identity, if any.
    pub fn current_identity(&self) -> Option<&TenantIdentity> {
        self.binding.as_ref().map(|b| &b.identity)
    }

    /// The bound tenant id, if any.
    pub fn current_tenant(&self) -> Option<&TenantId> {
        self.current_identity().map(|i| &i.tenant_id)
    }

    /// The bound tenant id, or the literal [`DEFAULT_TENANT`] sentinel.
    ///
    /// This is the only place the sentinel is ever substituted; everything
    /// else either works with `Option` or fails with
    /// [`IdentityError::NoIdentityBound`].
    pub fn current_or_default(&self) -> &str {
        self.current_tenant()
            .map(TenantId::as_str)
            .unwrap_or(DEFAULT_TENANT)
    }

    /// The bound tenant id, or [`IdentityError::NoIdentityBound`].
    pub fn require_tenant(&self) -> Result<&TenantId, IdentityError> {
        self.current_tenant().ok_or(IdentityError::NoIdentityBound)
    }

    /// Clear the binding. Idempotent: a second call is a no-op.
    pub fn unbind(&mut self) {
        if let Some(bound) = self.binding.take() {
            debug!(tenant_id = %bound.identity.tenant_id, "unbound tenant identity");
            self.registry.release(self.context_id);
        }
    }

    /// Bind `tenant_id` for the lifetime of the returned guard, restoring
    /// whatever was bound before, including nothing, when the guard
    /// drops, on every exit path (normal return, panic unwind, or future
    /// cancellation).
    ///
    /// The underlying bind primitive is not stack-aware; nesting works
    /// because each guard captures its own predecessor.
    pub fn scoped(&mut self, tenant_id: &str) -> Result<ScopedIdentity<'_>, IdentityError> {
        self.scoped_with(tenant_id, HashMap::new())
    }

    /// [`scoped`](Self::scoped) with identity metadata.
    pub fn scoped_with(
        &mut self,
        tenant_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<ScopedIdentity<'_>, IdentityError> {
        let previous = self.binding.as_ref().map(|b| b.identity.clone());
        self.bind_with(tenant_id, metadata)?;
        Ok(ScopedIdentity {
            context: self,
            previous,
        })
    }

    /// Single choke point for cross-tenant access decisions.
    ///
    /// Returns true iff no identity is bound (administrative caller) or the
    /// bound tenant owns the resource. Denials are logged, never silent.
    pub fn validate_access(&self, resource_tenant: &str) -> bool {
        match self.current_tenant() {
            None => {
                trace!(target_tenant = resource_tenant, "unbound context granted administrative access");
                true
            }
            Some(current) if current.as_str() == resource_tenant => true,
            Some(current) => {
                warn!(
                    tenant_id = %current,
                    target_tenant = resource_tenant,
                    "cross-tenant access denied"
                );
                false
            }
        }
    }

    /// [`validate_access`](Self::validate_access) as a hard failure.
    pub fn ensure_access(&self, resource_tenant: &str) -> Result<(), IdentityError> {
        if self.validate_access(resource_tenant) {
            Ok(())
        } else {
            Err(IdentityError::AccessDenied {
                current: self.current_or_default().to_string(),
                target: resource_tenant.to_string(),
            })
        }
    }

    /// Registry this context was minted from.
    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }
}

impl Drop for IdentityContext {
    fn drop(&mut self) {
        if self.binding.take().is_some() {
            self.registry.release(self.context_id);
        }
    }
}

impl std::fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityContext")
            .field("context_id", &self.context_id)
            .field("tenant", &self.current_or_default())
            .finish()
    }
}

/// Guard for a scoped identity binding.
///
/// Access the context through [`context`](Self::context) /
/// [`context_mut`](Self::context_mut) while the scope is active. On drop
/// the previous identity is restored exactly as it was, session id and
/// all.
#[must_use = "dropping the guard immediately ends the scope"]
pub struct ScopedIdentity<'a> {
    context: &'a mut IdentityContext,
    previous: Option<TenantIdentity>,
}

impl ScopedIdentity<'_> {
    pub fn context(&self) -> &IdentityContext {
        self.context
    }

    /// Mutable access, e.g. for nesting another scope.
    pub fn context_mut(&mut self) -> &mut IdentityContext {
        self.context
    }
}

impl Drop for ScopedIdentity<'_> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(identity) => {
                // Restoration is infallible: the slot was held throughout,
                // so no capacity check applies.
                let token = self.context.registry.restore(
                    self.context.context_id,
                    &identity.tenant_id,
                    Utc::now(),
                );
                trace!(tenant_id = %identity.tenant_id, "restored previous tenant identity");
                self.context.binding = Some(BoundIdentity {
                    identity,
                    _liveness: token,
                });
            }
            None => self.context.unbind(),
        }
    }
}
