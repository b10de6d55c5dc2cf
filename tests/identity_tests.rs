//! Tests for identity binding, registry ceilings, and TTL eviction.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Barrier;

use cordon::config::TenancyLimits;
use cordon::error::IdentityError;
use cordon::identity::TenantRegistry;

fn limits(max_active: usize, max_registry: usize, ttl_hours: u64) -> TenancyLimits {
    TenancyLimits {
        max_active_tenants: max_active,
        max_registry_size: max_registry,
        inactive_tenant_ttl_hours: ttl_hours,
        cleanup_interval_minutes: 60,
        enforce_tenant_limits: true,
    }
}

/// With a ceiling of 3 active tenants and 6 distinct tenants binding
/// concurrently with no intervening unbind, exactly 3 binds succeed and
/// exactly 3 fail with `CapacityExceeded`.
#[tokio::test]
async fn concurrent_binds_respect_active_ceiling() {
    let registry = TenantRegistry::new(limits(3, 20, 24));
    let start = Arc::new(Barrier::new(6));
    let hold = Arc::new(Barrier::new(6));

    let mut handles = Vec::new();
    for i in 0..6 {
        let registry = registry.clone();
        let start = start.clone();
        let hold = hold.clone();
        handles.push(tokio::spawn(async move {
            let mut ctx = registry.context();
            start.wait().await;
            let outcome = ctx.bind(&format!("tenant-{i}"));
            // Keep successful bindings alive until everyone has tried.
            hold.wait().await;
            outcome
        }));
    }

    let mut ok = 0;
    let mut capacity = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(IdentityError::CapacityExceeded { .. }) => capacity += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(capacity, 3);
}

#[tokio::test]
async fn released_slots_become_available_again() {
    let registry = TenantRegistry::new(limits(1, 20, 24));

    let mut first = registry.context();
    first.bind("one").unwrap();

    let mut second = registry.context();
    assert!(matches!(
        second.bind("two"),
        Err(IdentityError::CapacityExceeded { .. })
    ));

    first.unbind();
    second.bind("two").unwrap();
}

/// A tenant bound and unbound at t0, with a 1 hour TTL: a sweep at
/// t0+30min keeps its registry row, a sweep at t0+2h removes it.
#[test]
fn ttl_eviction_timeline() {
    let registry = TenantRegistry::new(limits(10, 20, 1));
    let t0 = Utc::now();

    let mut ctx = registry.context();
    ctx.bind("short-stay").unwrap();
    ctx.unbind();

    assert_eq!(registry.evict_expired_at(t0 + Duration::minutes(30)), 0);
    assert_eq!(registry.stats().total_tenants, 1);

    assert_eq!(registry.evict_expired_at(t0 + Duration::hours(2)), 1);
    assert_eq!(registry.stats().total_tenants, 0);
}

#[test]
fn stats_reflect_occupancy_and_ceilings() {
    let registry = TenantRegistry::new(limits(7, 11, 24));
    let mut a = registry.context();
    let mut b = registry.context();
    a.bind("stats-a").unwrap();
    b.bind("stats-b").unwrap();
    b.unbind();

    let stats = registry.stats();
    assert_eq!(stats.total_tenants, 2);
    assert_eq!(stats.active_contexts, 1);
    assert_eq!(stats.max_active_tenants, 7);
    assert_eq!(stats.max_registry_size, 11);
    assert!(stats.enforce_tenant_limits);
}

#[test]
fn scoped_binding_across_contexts_is_independent() {
    let registry = TenantRegistry::new(limits(10, 20, 24));
    let mut ctx_a = registry.context();
    let mut ctx_b = registry.context();

    ctx_a.bind("alpha").unwrap();
    {
        let scope = ctx_b.scoped("beta").unwrap();
        assert_eq!(scope.context().current_or_default(), "beta");
        // The other context's binding is untouched.
        assert_eq!(ctx_a.current_or_default(), "alpha");
    }
    assert!(ctx_b.current_tenant().is_none());
    assert_eq!(ctx_a.current_or_default(), "alpha");
}

#[test]
fn registry_ceiling_applies_to_unbound_history() {
    // Registry rows outlive bindings; the total ceiling counts them all.
    let registry = TenantRegistry::new(limits(10, 3, 24));
    for i in 0..3 {
        let mut ctx = registry.context();
        ctx.bind(&format!("historic-{i}")).unwrap();
        ctx.unbind();
    }

    let mut ctx = registry.context();
    assert!(matches!(
        ctx.bind("one-too-many"),
        Err(IdentityError::CapacityExceeded { .. })
    ));

    // A tenant already in the registry still binds.
    ctx.bind("historic-0").unwrap();
}
