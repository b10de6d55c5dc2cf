//! Tenant namespace derivation.
//!
//! Namespaces partition shared storage per tenant. The derived string is
//! stable (`{tenant_id}_{component}`) and is never reverse-parsed by any
//! consumer in this crate.

use crate::error::IdentityError;
use crate::identity::IdentityContext;

/// Well-known namespace components.
pub mod component {
    /// Property-graph partition.
    pub const GRAPH: &str = "graph";
    /// Vector-index partition.
    pub const EMBEDDINGS: &str = "embeddings";
}

/// Derives per-tenant storage keys and gates every explicit-target
/// derivation through the access check.
pub struct NamespaceResolver;

impl NamespaceResolver {
    /// Derive the namespace for a tenant and component.
    ///
    /// Pure derivation, no access check: only call with a tenant id that
    /// has already passed [`IdentityContext::validate_access`], or use
    /// [`resolve`](Self::resolve).
    pub fn namespace_for(tenant_id: &str, component: &str) -> String {
        format!("{tenant_id}_{component}")
    }

    /// Derive the namespace for the context's current tenant (or the
    /// default sentinel when unbound).
    pub fn for_current(ctx: &IdentityContext, component: &str) -> String {
        Self::namespace_for(ctx.current_or_default(), component)
    }

    /// Derive the namespace for an explicitly named target tenant.
    ///
    /// Runs the access check first and fails with
    /// [`IdentityError::AccessDenied`] on mismatch; the caller's own
    /// tenant is never silently substituted.
    pub fn resolve(
        ctx: &IdentityContext,
        target_tenant: &str,
        component: &str,
    ) -> Result<String, IdentityError> {
        ctx.ensure_access(target_tenant)?;
        Ok(Self::namespace_for(target_tenant, component))
    }
}
