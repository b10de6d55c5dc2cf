use thiserror::Error;

use crate::port::BackendId;
use crate::tx::{TransactionId, UncompensatedOperation};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Identity and registry errors.
///
/// All of these are terminal per call; the crate never retries a failed
/// bind internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid tenant identifier {id:?}: {reason}")]
    InvalidIdentifier { id: String, reason: &'static str },

    #[error("no tenant identity bound to this context")]
    NoIdentityBound,

    #[error("{scope} capacity exceeded: {current} >= limit {limit}")]
    CapacityExceeded {
        scope: &'static str,
        current: usize,
        limit: usize,
    },

    #[error("access denied: tenant '{current}' cannot access resources of '{target}'")]
    AccessDenied { current: String, target: String },
}

/// Errors surfaced by backend adapters.
///
/// `Clone` so a compensation failure can appear in a
/// [`PartialRollback`](TransactionError::PartialRollback) listing and still
/// be logged independently.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("{backend} unavailable: {reason}")]
    Unavailable { backend: BackendId, reason: String },

    #[error("constraint violation on {backend}: {reason}")]
    ConstraintViolation { backend: BackendId, reason: String },
}

impl BackendError {
    /// Which backend produced this error.
    pub fn backend(&self) -> BackendId {
        match self {
            Self::Unavailable { backend, .. } | Self::ConstraintViolation { backend, .. } => {
                *backend
            }
        }
    }
}

/// Terminal transaction outcomes that are not a commit.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Every applied operation was compensated; the backends are back in
    /// their pre-transaction observable state.
    #[error("transaction {transaction_id} rolled back for tenant '{tenant_id}': {cause}")]
    RolledBack {
        transaction_id: TransactionId,
        tenant_id: String,
        #[source]
        cause: BackendError,
    },

    /// One or more compensations failed after bounded retries. The listed
    /// operations are still applied on their backends and need manual
    /// reconciliation.
    #[error(
        "transaction {transaction_id} partially rolled back for tenant '{tenant_id}': \
         {} operation(s) left un-compensated (triggered by: {cause})",
        .uncompensated.len()
    )]
    PartialRollback {
        transaction_id: TransactionId,
        tenant_id: String,
        uncompensated: Vec<UncompensatedOperation>,
        #[source]
        cause: BackendError,
    },
}

impl TransactionError {
    /// Transaction the error belongs to.
    pub fn transaction_id(&self) -> &TransactionId {
        match self {
            Self::RolledBack { transaction_id, .. }
            | Self::PartialRollback { transaction_id, .. } => transaction_id,
        }
    }

    /// The backend failure that triggered the rollback.
    pub fn cause(&self) -> &BackendError {
        match self {
            Self::RolledBack { cause, .. } | Self::PartialRollback { cause, .. } => cause,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

pub type Result<T> = std::result::Result<T, Error>;
