//! Tenant identity propagation and the bounded tenant registry.
//!
//! Two halves: [`TenantRegistry`] is the shared, mutex-owned bookkeeping
//! for every tenant the process has seen; [`IdentityContext`] is the
//! execution-context-local carrier of the currently bound identity,
//! passed explicitly to every API that needs it.

mod context;
mod registry;

pub use context::{IdentityContext, ScopedIdentity, TenantIdentity, DEFAULT_TENANT};
pub use registry::{RegistryStats, TenantRegistry, TenantRegistryEntry};

use std::fmt;

use serde::Serialize;

use crate::error::IdentityError;

/// Validated tenant identifier.
///
/// The inner String is private; construction goes through [`TenantId::new`],
/// which enforces the safe charset (letters, digits, underscore, hyphen)
/// so a tenant id can never inject separators into a derived namespace
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentityError::InvalidIdentifier {
                id,
                reason: "must not be empty",
            });
        }
        if !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(IdentityError::InvalidIdentifier {
                id,
                reason: "only letters, digits, underscore and hyphen are allowed",
            });
        }
        Ok(Self(id))
    }

    /// Get the tenant id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TenantId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
