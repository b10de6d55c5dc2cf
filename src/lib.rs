//! Cordon - Multi-tenant coordination for paired graph and vector stores.
//!
//! This crate coordinates shared-process, multi-tenant access to two
//! independent backing stores, a property-graph store and a
//! vector-similarity index, that have no common transaction protocol.
//! It guarantees that no tenant observes another tenant's data, that a
//! unit of work spanning both stores either fully applies or is fully
//! undone, and that bookkeeping for an unbounded stream of tenants stays
//! within fixed limits.
//!
//! # Architecture
//!
//! Hexagonal: the core talks to the stores only through port traits, and
//! every data path runs through the identity layer's access check.
//!
//! - [`identity`] - Tenant identity propagation and the bounded,
//!   TTL-evicted tenant registry
//! - [`namespace`] - Collision-free per-tenant storage keys and the
//!   access-check choke point
//! - [`port`] - Capability contracts for the two backends
//! - [`adapter`] - Embedded in-memory reference adapters
//! - [`factory`] - One shared adapter per backend, wrapped with tenant
//!   validation
//! - [`tx`] - Saga-style cross-store transactions with compensating
//!   actions
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use cordon::config::Config;
//! use cordon::factory::StorageFactory;
//! use cordon::identity::TenantRegistry;
//! use cordon::port::{GraphNode, VectorRecord};
//! use cordon::tx::TxOperation;
//!
//! # async fn demo() -> cordon::Result<()> {
//! let config = Config::from_env()?;
//! let registry = TenantRegistry::new(config.limits.clone());
//! let factory = StorageFactory::in_memory();
//! let coordinator = factory.coordinator(config.compensation.clone());
//!
//! let mut ctx = registry.context();
//! ctx.bind("acme")?;
//!
//! // Create a node and its embedding as one unit: both land, or neither.
//! coordinator
//!     .run(
//!         &ctx,
//!         vec![
//!             TxOperation::create_node(GraphNode::new("doc-1", "Document")),
//!             TxOperation::upsert_vector(VectorRecord::new("doc-1", vec![0.1, 0.9])),
//!         ],
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod factory;
pub mod identity;
pub mod namespace;
pub mod port;
pub mod tx;

pub use config::Config;
pub use error::{Error, Result};
pub use factory::StorageFactory;
pub use identity::{IdentityContext, TenantId, TenantRegistry};
pub use namespace::NamespaceResolver;
pub use tx::{TransactionCoordinator, TxOperation};
