//! Property-graph store port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BackendError;

/// A labeled node with free-form properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A typed, directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: kind.into(),
            properties: Map::new(),
        }
    }
}

/// Everything stored under one namespace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Capability contract the core requires of a property-graph backend.
///
/// Semantics adapters must honor:
/// - `add_node` / `add_edge` reject an already-present id with
///   [`BackendError::ConstraintViolation`]; `add_edge` also rejects edges
///   whose endpoints are absent.
/// - `remove_node` / `remove_edge` are idempotent (`Ok` on an absent id),
///   so a compensating removal can be retried safely.
/// - Connectivity failures surface as [`BackendError::Unavailable`].
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn add_node(&self, namespace: &str, node: GraphNode) -> Result<(), BackendError>;

    async fn add_edge(&self, namespace: &str, edge: GraphEdge) -> Result<(), BackendError>;

    async fn remove_node(&self, namespace: &str, id: &str) -> Result<(), BackendError>;

    async fn remove_edge(&self, namespace: &str, id: &str) -> Result<(), BackendError>;

    /// Full contents of a namespace.
    async fn subgraph(&self, namespace: &str) -> Result<Subgraph, BackendError>;

    /// Drop a namespace and everything in it. `Ok` if already absent.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), BackendError>;
}
