//! Shared tenant registry with capacity ceilings and TTL eviction.
//!
//! One registry instance is shared by every [`IdentityContext`] minted from
//! it. All mutation goes through a single mutex; per-context bindings live
//! in the contexts themselves and never touch the lock on read.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::TenancyLimits;
use crate::error::IdentityError;
use crate::identity::context::IdentityContext;
use crate::identity::TenantId;

/// One row per distinct tenant seen while under capacity.
#[derive(Debug, Clone)]
pub struct TenantRegistryEntry {
    pub tenant_id: TenantId,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

/// A currently bound identity in some execution context.
///
/// The `liveness` handle is held by the binding inside the owning
/// [`IdentityContext`]; once it drops, sweeps reclaim this row even if the
/// context never called `unbind`.
struct LiveBinding {
    tenant_id: TenantId,
    liveness: Weak<()>,
}

impl LiveBinding {
    fn is_live(&self) -> bool {
        self.liveness.strong_count() > 0
    }
}

struct RegistryInner {
    entries: HashMap<TenantId, TenantRegistryEntry>,
    bindings: HashMap<u64, LiveBinding>,
    last_sweep: Option<DateTime<Utc>>,
}

/// Snapshot of registry occupancy and configured ceilings.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_tenants: usize,
    pub active_contexts: usize,
    pub max_active_tenants: usize,
    pub max_registry_size: usize,
    pub inactive_tenant_ttl_hours: u64,
    pub enforce_tenant_limits: bool,
}

/// Process-wide bookkeeping for known tenants.
///
/// Explicit lifecycle: construct with [`TenantRegistry::new`], mint
/// contexts with [`TenantRegistry::context`], and drop when done. Nothing
/// here is a global.
pub struct TenantRegistry {
    limits: TenancyLimits,
    inner: Mutex<RegistryInner>,
    next_context_id: AtomicU64,
}

impl TenantRegistry {
    pub fn new(limits: TenancyLimits) -> Arc<Self> {
        Arc::new(Self {
            limits,
            inner: Mutex::new(RegistryInner {
                entries: HashMap::new(),
                bindings: HashMap::new(),
                last_sweep: None,
            }),
            next_context_id: AtomicU64::new(0),
        })
    }

    /// Mint an identity context for one execution context (task, request,
    /// or thread). Contexts are cheap; create one per unit of concurrent
    /// work and drop it when the work ends.
    pub fn context(self: &Arc<Self>) -> IdentityContext {
        let id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        IdentityContext::new(Arc::clone(self), id)
    }

    pub fn limits(&self) -> &TenancyLimits {
        &self.limits
    }

    /// Bind `tenant` in the context identified by `context_id`.
    ///
    /// Runs the opportunistic sweep, enforces ceilings (with a forced sweep
    /// before giving up), and creates or refreshes the tenant's registry
    /// row. On error nothing is mutated, so the caller's previous binding
    /// stays valid. Returns the liveness token the context must hold for
    /// as long as the binding exists.
    pub(crate) fn bind(
        &self,
        context_id: u64,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<Arc<()>, IdentityError> {
        let mut inner = self.inner.lock();

        if self.sweep_due(&inner, now) {
            self.sweep_locked(&mut inner, now);
        }

        if self.limits.enforce_tenant_limits {
            self.check_active_ceiling(&mut inner, context_id, now)?;
            self.check_registry_ceiling(&mut inner, tenant, now)?;
        }

        let entry = inner
            .entries
            .entry(tenant.clone())
            .or_insert_with(|| TenantRegistryEntry {
                tenant_id: tenant.clone(),
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
            });
        entry.last_accessed_at = now;
        entry.access_count += 1;

        let token = Arc::new(());
        inner.bindings.insert(
            context_id,
            LiveBinding {
                tenant_id: tenant.clone(),
                liveness: Arc::downgrade(&token),
            },
        );
        trace!(tenant_id = %tenant, context_id, "bound tenant identity");
        Ok(token)
    }

    /// Re-establish a binding while restoring a scope's previous identity.
    ///
    /// Infallible: the context held its slot for the whole inner scope, so
    /// no ceiling applies, and the registry row is re-created if a sweep
    /// removed it while the scope was active.
    pub(crate) fn restore(
        &self,
        context_id: u64,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> Arc<()> {
        let mut inner = self.inner.lock();
        inner
            .entries
            .entry(tenant.clone())
            .or_insert_with(|| TenantRegistryEntry {
                tenant_id: tenant.clone(),
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
            })
            .last_accessed_at = now;

        let token = Arc::new(());
        inner.bindings.insert(
            context_id,
            LiveBinding {
                tenant_id: tenant.clone(),
                liveness: Arc::downgrade(&token),
            },
        );
        token
    }

    /// Remove the live-binding row for a context. Idempotent.
    pub(crate) fn release(&self, context_id: u64) {
        let mut inner = self.inner.lock();
        if let Some(binding) = inner.bindings.remove(&context_id) {
            trace!(tenant_id = %binding.tenant_id, context_id, "released tenant binding");
        }
    }

    /// Sweep the registry with the current wall clock.
    ///
    /// Returns the number of rows evicted. See [`evict_expired_at`] for the
    /// eviction rules.
    ///
    /// [`evict_expired_at`]: TenantRegistry::evict_expired_at
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    /// Sweep the registry against an explicit clock.
    ///
    /// Removes bookkeeping for execution contexts that no longer exist,
    /// then evicts entries idle for at least the configured TTL. A tenant
    /// with a live binding in some context is never evicted, regardless of
    /// its timestamps. TTL zero evicts every entry without a live binding.
    ///
    /// Sweeps are serialized by the registry lock; hosts driving their own
    /// clock (tests, simulations) pass `now` directly.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock();
        self.sweep_locked(&mut inner, now)
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock();
        RegistryStats {
            total_tenants: inner.entries.len(),
            active_contexts: inner.bindings.values().filter(|b| b.is_live()).count(),
            max_active_tenants: self.limits.max_active_tenants,
            max_registry_size: self.limits.max_registry_size,
            inactive_tenant_ttl_hours: self.limits.inactive_tenant_ttl_hours,
            enforce_tenant_limits: self.limits.enforce_tenant_limits,
        }
    }

    /// All currently registered tenant ids, unordered.
    pub fn registered_tenants(&self) -> Vec<TenantId> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    fn sweep_due(&self, inner: &RegistryInner, now: DateTime<Utc>) -> bool {
        let interval = Duration::minutes(self.limits.cleanup_interval_minutes as i64);
        inner
            .last_sweep
            .map_or(true, |last| now.signed_duration_since(last) >= interval)
    }

    fn sweep_locked(&self, inner: &mut RegistryInner, now: DateTime<Utc>) -> usize {
        inner.bindings.retain(|_, binding| binding.is_live());
        let live: HashSet<TenantId> = inner
            .bindings
            .values()
            .map(|b| b.tenant_id.clone())
            .collect();

        let ttl_hours = self.limits.inactive_tenant_ttl_hours;
        let before = inner.entries.len();
        inner.entries.retain(|tenant_id, entry| {
            if live.contains(tenant_id) {
                return true;
            }
            if ttl_hours == 0 {
                return false;
            }
            let age = now.signed_duration_since(entry.last_accessed_at);
            age < Duration::hours(ttl_hours as i64)
        });
        inner.last_sweep = Some(now);

        let evicted = before - inner.entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = inner.entries.len(), "registry sweep evicted tenants");
        }
        evicted
    }

    fn check_active_ceiling(
        &self,
        inner: &mut RegistryInner,
        context_id: u64,
        now: DateTime<Utc>,
    ) -> Result<(), IdentityError> {
        // Rebinding in the same context reuses its slot.
        let occupied = |inner: &RegistryInner| {
            inner
                .bindings
                .iter()
                .filter(|(id, b)| **id != context_id && b.is_live())
                .count()
        };

        if occupied(inner) >= self.limits.max_active_tenants {
            self.sweep_locked(inner, now);
            let current = occupied(inner);
            if current >= self.limits.max_active_tenants {
                return Err(IdentityError::CapacityExceeded {
                    scope: "active tenants",
                    current,
                    limit: self.limits.max_active_tenants,
                });
            }
        }
        Ok(())
    }

    fn check_registry_ceiling(
        &self,
        inner: &mut RegistryInner,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<(), IdentityError> {
        if !inner.entries.contains_key(tenant) && inner.entries.len() >= self.limits.max_registry_size
        {
            self.sweep_locked(inner, now);
            if inner.entries.len() >= self.limits.max_registry_size {
                return Err(IdentityError::CapacityExceeded {
                    scope: "tenant registry",
                    current: inner.entries.len(),
                    limit: self.limits.max_registry_size,
                });
            }
        }
        Ok(())
    }

    /// Registry entry snapshot for one tenant, if present.
    pub fn entry(&self, tenant: &TenantId) -> Option<TenantRegistryEntry> {
        self.inner.lock().entries.get(tenant).cloned()
    }
}

impl std::fmt::Debug for TenantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("TenantRegistry")
            .field("total_tenants", &stats.total_tenants)
            .field("active_contexts", &stats.active_contexts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_active: usize, max_registry: usize, ttl_hours: u64) -> TenancyLimits {
        TenancyLimits {
            max_active_tenants: max_active,
            max_registry_size: max_registry,
            inactive_tenant_ttl_hours: ttl_hours,
            cleanup_interval_minutes: 60,
            enforce_tenant_limits: true,
        }
    }

    #[test]
    fn ttl_sweep_respects_age_threshold() {
        let registry = TenantRegistry::new(limits(10, 10, 1));
        let t0 = Utc::now();
        let tenant = TenantId::new("acme").unwrap();

        let token = registry.bind(0, &tenant, t0).unwrap();
        drop(token); // unbound

        assert_eq!(registry.evict_expired_at(t0 + Duration::minutes(30)), 0);
        assert!(registry.entry(&tenant).is_some());

        assert_eq!(registry.evict_expired_at(t0 + Duration::hours(2)), 1);
        assert!(registry.entry(&tenant).is_none());
    }

    #[test]
    fn ttl_zero_evicts_unconditionally() {
        let registry = TenantRegistry::new(limits(10, 10, 0));
        let t0 = Utc::now();
        let tenant = TenantId::new("ephemeral").unwrap();

        let token = registry.bind(0, &tenant, t0).unwrap();
        drop(token);

        // Same instant: age is zero, but TTL=0 means evict on every sweep.
        assert_eq!(registry.evict_expired_at(t0), 1);
    }

    #[test]
    fn live_binding_survives_stale_sweep() {
        let registry = TenantRegistry::new(limits(10, 10, 1));
        let t0 = Utc::now();
        let tenant = TenantId::new("pinned").unwrap();

        let _token = registry.bind(0, &tenant, t0).unwrap();

        // Timestamp looks ancient, but the binding is live.
        assert_eq!(registry.evict_expired_at(t0 + Duration::hours(48)), 0);
        assert!(registry.entry(&tenant).is_some());
    }

    #[test]
    fn dead_context_bookkeeping_is_reclaimed() {
        let registry = TenantRegistry::new(limits(1, 10, 24));
        let t0 = Utc::now();

        let token = registry.bind(0, &TenantId::new("gone").unwrap(), t0).unwrap();
        drop(token); // context died without unbind

        // The dead binding no longer counts toward the active ceiling.
        registry
            .bind(1, &TenantId::new("next").unwrap(), t0)
            .unwrap();
    }

    #[test]
    fn active_ceiling_rejects_over_capacity() {
        let registry = TenantRegistry::new(limits(2, 10, 24));
        let t0 = Utc::now();

        let _a = registry.bind(0, &TenantId::new("a").unwrap(), t0).unwrap();
        let _b = registry.bind(1, &TenantId::new("b").unwrap(), t0).unwrap();
        let err = registry.bind(2, &TenantId::new("c").unwrap(), t0).unwrap_err();
        assert!(matches!(
            err,
            IdentityError::CapacityExceeded { scope: "active tenants", .. }
        ));
    }

    #[test]
    fn rebind_reuses_context_slot() {
        let registry = TenantRegistry::new(limits(1, 10, 24));
        let t0 = Utc::now();

        let _a = registry.bind(0, &TenantId::new("a").unwrap(), t0).unwrap();
        // Same context rebinding must not trip the active ceiling.
        let _b = registry.bind(0, &TenantId::new("b").unwrap(), t0).unwrap();
    }

    #[test]
    fn registry_ceiling_counts_distinct_tenants() {
        let registry = TenantRegistry::new(limits(10, 2, 24));
        let t0 = Utc::now();

        let _a = registry.bind(0, &TenantId::new("a").unwrap(), t0).unwrap();
        let _b = registry.bind(1, &TenantId::new("b").unwrap(), t0).unwrap();
        let err = registry.bind(2, &TenantId::new("c").unwrap(), t0).unwrap_err();
        assert!(matches!(
            err,
            IdentityError::CapacityExceeded { scope: "tenant registry", .. }
        ));

        // A known tenant still binds fine.
        let _a2 = registry.bind(3, &TenantId::new("a").unwrap(), t0).unwrap();
    }

    #[test]
    fn enforcement_off_disables_ceilings() {
        let mut l = limits(1, 1, 24);
        l.enforce_tenant_limits = false;
        let registry = TenantRegistry::new(l);
        let t0 = Utc::now();

        for i in 0..5 {
            registry
                .bind(i, &TenantId::new(format!("t{i}")).unwrap(), t0)
                .unwrap();
        }
        assert_eq!(registry.stats().total_tenants, 5);
    }

    #[test]
    fn access_count_increments_on_refresh() {
        let registry = TenantRegistry::new(limits(10, 10, 24));
        let t0 = Utc::now();
        let tenant = TenantId::new("counted").unwrap();

        let _t1 = registry.bind(0, &tenant, t0).unwrap();
        let _t2 = registry.bind(1, &tenant, t0 + Duration::seconds(5)).unwrap();

        let entry = registry.entry(&tenant).unwrap();
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed_at, t0 + Duration::seconds(5));
    }
}
