#![allow(dead_code)]

//! Shared test fixtures: backend adapters with scripted failures and
//! call recording, wrapped around the embedded in-memory stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use cordon::adapter::{MemoryGraphStore, MemoryVectorStore};
use cordon::error::BackendError;
use cordon::port::{
    BackendId, GraphEdge, GraphNode, GraphStore, MetadataFilter, SearchHit, Subgraph,
    VectorRecord, VectorStore,
};

fn unavailable(backend: BackendId, op: &str) -> BackendError {
    BackendError::Unavailable {
        backend,
        reason: format!("injected failure in {op}"),
    }
}

/// Vector store that fails a scripted number of `upsert` and `remove`
/// calls before passing through to the in-memory store.
#[derive(Default)]
pub struct ScriptedVectorStore {
    inner: MemoryVectorStore,
    fail_upserts: AtomicUsize,
    fail_removes: AtomicUsize,
}

impl ScriptedVectorStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` upsert calls.
    pub fn fail_upserts(&self, n: usize) {
        self.fail_upserts.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` remove calls.
    pub fn fail_removes(&self, n: usize) {
        self.fail_removes.store(n, Ordering::SeqCst);
    }

    fn should_fail(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl VectorStore for ScriptedVectorStore {
    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<(), BackendError> {
        if Self::should_fail(&self.fail_upserts) {
            return Err(unavailable(BackendId::Vector, "upsert"));
        }
        self.inner.upsert(namespace, record).await
    }

    async fn fetch(&self, namespace: &str, id: &str) -> Result<Option<VectorRecord>, BackendError> {
        self.inner.fetch(namespace, id).await
    }

    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        filter: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, BackendError> {
        self.inner.search(namespace, query, filter, top_k).await
    }

    async fn remove(&self, namespace: &str, id: &str) -> Result<(), BackendError> {
        if Self::should_fail(&self.fail_removes) {
            return Err(unavailable(BackendId::Vector, "remove"));
        }
        self.inner.remove(namespace, id).await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), BackendError> {
        self.inner.delete_namespace(namespace).await
    }
}

/// Graph store that records every mutating call, for asserting rollback
/// order.
#[derive(Default)]
pub struct RecordingGraphStore {
    inner: MemoryGraphStore,
    calls: Mutex<Vec<String>>,
}

impl RecordingGraphStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl GraphStore for RecordingGraphStore {
    async fn add_node(&self, namespace: &str, node: GraphNode) -> Result<(), BackendError> {
        self.record(format!("add_node:{}", node.id));
        self.inner.add_node(namespace, node).await
    }

    async fn add_edge(&self, namespace: &str, edge: GraphEdge) -> Result<(), BackendError> {
        self.record(format!("add_edge:{}", edge.id));
        self.inner.add_edge(namespace, edge).await
    }

    async fn remove_node(&self, namespace: &str, id: &str) -> Result<(), BackendError> {
        self.record(format!("remove_node:{id}"));
        self.inner.remove_node(namespace, id).await
    }

    async fn remove_edge(&self, namespace: &str, id: &str) -> Result<(), BackendError> {
        self.record(format!("remove_edge:{id}"));
        self.inner.remove_edge(namespace, id).await
    }

    async fn subgraph(&self, namespace: &str) -> Result<Subgraph, BackendError> {
        self.inner.subgraph(namespace).await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), BackendError> {
        self.record(format!("delete_namespace:{namespace}"));
        self.inner.delete_namespace(namespace).await
    }
}
