//! In-memory store implementations.
//!
//! Reference adapters for embedded use and testing. Namespaces are plain
//! map keys; isolation between them is exactly as strong as the namespace
//! derivation that produced the key, which is the point: these adapters
//! know nothing about tenants.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::BackendError;
use crate::port::{
    BackendId, GraphEdge, GraphNode, GraphStore, MetadataFilter, SearchHit, Subgraph,
    VectorRecord, VectorStore,
};

#[derive(Debug, Default)]
struct GraphNamespace {
    nodes: HashMap<String, GraphNode>,
    edges: HashMap<String, GraphEdge>,
}

/// In-memory property-graph store.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    namespaces: RwLock<HashMap<String, GraphNamespace>>,
}

impl MemoryGraphStore {
    /// Create a new empty graph store.
    pub fn new() -> Self {
        Self::default()
    }

    fn constraint(reason: String) -> BackendError {
        BackendError::ConstraintViolation {
            backend: BackendId::Graph,
            reason,
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn add_node(&self, namespace: &str, node: GraphNode) -> Result<(), BackendError> {
        let mut namespaces = self.namespaces.write();
        let ns = namespaces.entry(namespace.to_string()).or_default();
        if ns.nodes.contains_key(&node.id) {
            return Err(Self::constraint(format!("node '{}' already exists", node.id)));
        }
        ns.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn add_edge(&self, namespace: &str, edge: GraphEdge) -> Result<(), BackendError> {
        let mut namespaces = self.namespaces.write();
        let ns = namespaces.entry(namespace.to_string()).or_default();
        if ns.edges.contains_key(&edge.id) {
            return Err(Self::constraint(format!("edge '{}' already exists", edge.id)));
        }
        if !ns.nodes.contains_key(&edge.source) || !ns.nodes.contains_key(&edge.target) {
            return Err(Self::constraint(format!(
                "edge '{}' references a missing endpoint",
                edge.id
            )));
        }
        ns.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    async fn remove_node(&self, namespace: &str, id: &str) -> Result<(), BackendError> {
        let mut namespaces = self.namespaces.write();
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.nodes.remove(id);
            // Dangling edges go with their endpoint.
            ns.edges
                .retain(|_, edge| edge.source != id && edge.target != id);
        }
        Ok(())
    }

    async fn remove_edge(&self, namespace: &str, id: &str) -> Result<(), BackendError> {
        let mut namespaces = self.namespaces.write();
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.edges.remove(id);
        }
        Ok(())
    }

    async fn subgraph(&self, namespace: &str) -> Result<Subgraph, BackendError> {
        let namespaces = self.namespaces.read();
        Ok(namespaces
            .get(namespace)
            .map(|ns| Subgraph {
                nodes: ns.nodes.values().cloned().collect(),
                edges: ns.edges.values().cloned().collect(),
            })
            .unwrap_or_default())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), BackendError> {
        self.namespaces.write().remove(namespace);
        Ok(())
    }
}

/// In-memory vector index with cosine-similarity search.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl MemoryVectorStore {
    /// Create a new empty vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(record: &VectorRecord, filter: Option<&MetadataFilter>) -> bool {
    match filter {
        None => true,
        Some(filter) => filter
            .iter()
            .all(|(key, value)| record.metadata.get(key) == Some(value)),
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<(), BackendError> {
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn fetch(&self, namespace: &str, id: &str) -> Result<Option<VectorRecord>, BackendError> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .and_then(|ns| ns.get(id))
            .cloned())
    }

    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        filter: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, BackendError> {
        let namespaces = self.namespaces.read();
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = ns
            .values()
            .filter(|record| matches_filter(record, filter))
            .map(|record| SearchHit {
                id: record.id.clone(),
                score: cosine_similarity(query, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn remove(&self, namespace: &str, id: &str) -> Result<(), BackendError> {
        if let Some(ns) = self.namespaces.write().get_mut(namespace) {
            ns.remove(id);
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), BackendError> {
        self.namespaces.write().remove(namespace);
        Ok(())
    }
}
