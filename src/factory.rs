//! Storage factory and tenant-validated store handles.
//!
//! The factory owns exactly one adapter instance per backend (a pooled
//! connection in a real deployment, shared across every tenant) and
//! hands out thin handles that derive the tenant namespace and run the
//! access check on every call. Isolation lives entirely at the namespace
//! and validation layer, never in per-tenant connections.

use std::sync::Arc;

use crate::adapter::{MemoryGraphStore, MemoryVectorStore};
use crate::config::CompensationConfig;
use crate::error::Result;
use crate::identity::IdentityContext;
use crate::namespace::{component, NamespaceResolver};
use crate::port::{
    GraphEdge, GraphNode, GraphStore, MetadataFilter, SearchHit, Subgraph, VectorRecord,
    VectorStore,
};
use crate::tx::TransactionCoordinator;

/// Builds and caches backend adapters; returns tenant-validated handles.
pub struct StorageFactory {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
}

impl StorageFactory {
    /// Factory over the embedded in-memory backends.
    pub fn in_memory() -> Self {
        Self {
            graph: Arc::new(MemoryGraphStore::new()),
            vector: Arc::new(MemoryVectorStore::new()),
        }
    }

    /// Factory over caller-supplied backend adapters.
    ///
    /// Each adapter is expected to be the single shared instance for its
    /// backend; the factory never constructs another.
    pub fn with_backends(graph: Arc<dyn GraphStore>, vector: Arc<dyn VectorStore>) -> Self {
        Self { graph, vector }
    }

    /// The shared graph adapter, unwrapped. For wiring components like the
    /// coordinator, not for tenant-scoped data access.
    pub fn graph_backend(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&self.graph)
    }

    /// The shared vector adapter, unwrapped.
    pub fn vector_backend(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.vector)
    }

    /// Tenant-validated graph handle.
    pub fn tenant_graph(&self) -> TenantGraphStore {
        TenantGraphStore {
            inner: Arc::clone(&self.graph),
        }
    }

    /// Tenant-validated vector handle.
    pub fn tenant_vectors(&self) -> TenantVectorStore {
        TenantVectorStore {
            inner: Arc::clone(&self.vector),
        }
    }

    /// Transaction coordinator over this factory's backends.
    pub fn coordinator(&self, compensation: CompensationConfig) -> TransactionCoordinator {
        TransactionCoordinator::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.vector),
            compensation,
        )
    }
}

impl std::fmt::Debug for StorageFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFactory").finish_non_exhaustive()
    }
}

/// Graph-store handle scoped to the calling tenant.
///
/// Every method takes the caller's [`IdentityContext`]; the namespace is
/// derived per call, so rebinding the context redirects the handle. Calls
/// that name an explicit target tenant go through the access check and
/// fail with [`AccessDenied`](crate::error::IdentityError::AccessDenied)
/// rather than falling back to the caller's own data.
#[derive(Clone)]
pub struct TenantGraphStore {
    inner: Arc<dyn GraphStore>,
}

impl TenantGraphStore {
    pub async fn add_node(&self, ctx: &IdentityContext, node: GraphNode) -> Result<()> {
        let ns = NamespaceResolver::for_current(ctx, component::GRAPH);
        Ok(self.inner.add_node(&ns, node).await?)
    }

    pub async fn add_edge(&self, ctx: &IdentityContext, edge: GraphEdge) -> Result<()> {
        let ns = NamespaceResolver::for_current(ctx, component::GRAPH);
        Ok(self.inner.add_edge(&ns, edge).await?)
    }

    pub async fn remove_node(&self, ctx: &IdentityContext, id: &str) -> Result<()> {
        let ns = NamespaceResolver::for_current(ctx, component::GRAPH);
        Ok(self.inner.remove_node(&ns, id).await?)
    }

    /// The calling tenant's full subgraph.
    pub async fn subgraph(&self, ctx: &IdentityContext) -> Result<Subgraph> {
        let ns = NamespaceResolver::for_current(ctx, component::GRAPH);
        Ok(self.inner.subgraph(&ns).await?)
    }

    /// An explicitly named tenant's subgraph; access-checked.
    pub async fn subgraph_of(&self, ctx: &IdentityContext, tenant_id: &str) -> Result<Subgraph> {
        let ns = NamespaceResolver::resolve(ctx, tenant_id, component::GRAPH)?;
        Ok(self.inner.subgraph(&ns).await?)
    }

    /// Delete an explicitly named tenant's graph partition; access-checked.
    pub async fn purge(&self, ctx: &IdentityContext, tenant_id: &str) -> Result<()> {
        let ns = NamespaceResolver::resolve(ctx, tenant_id, component::GRAPH)?;
        Ok(self.inner.delete_namespace(&ns).await?)
    }
}

/// Vector-store handle scoped to the calling tenant.
#[derive(Clone)]
pub struct TenantVectorStore {
    inner: Arc<dyn VectorStore>,
}

impl TenantVectorStore {
    pub async fn upsert(&self, ctx: &IdentityContext, record: VectorRecord) -> Result<()> {
        let ns = NamespaceResolver::for_current(ctx, component::EMBEDDINGS);
        Ok(self.inner.upsert(&ns, record).await?)
    }

    pub async fn fetch(&self, ctx: &IdentityContext, id: &str) -> Result<Option<VectorRecord>> {
        let ns = NamespaceResolver::for_current(ctx, component::EMBEDDINGS);
        Ok(self.inner.fetch(&ns, id).await?)
    }

    pub async fn search(
        &self,
        ctx: &IdentityContext,
        query: &[f32],
        filter: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let ns = NamespaceResolver::for_current(ctx, component::EMBEDDINGS);
        Ok(self.inner.search(&ns, query, filter, top_k).await?)
    }

    pub async fn remove(&self, ctx: &IdentityContext, id: &str) -> Result<()> {
        let ns = NamespaceResolver::for_current(ctx, component::EMBEDDINGS);
        Ok(self.inner.remove(&ns, id).await?)
    }

    /// Delete an explicitly named tenant's vector partition; access-checked.
    pub async fn purge(&self, ctx: &IdentityContext, tenant_id: &str) -> Result<()> {
        let ns = NamespaceResolver::resolve(ctx, tenant_id, component::EMBEDDINGS)?;
        Ok(self.inner.delete_namespace(&ns).await?)
    }
}
