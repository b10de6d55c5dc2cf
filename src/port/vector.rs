//! Vector-similarity index port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BackendError;

/// An embedding with free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            values,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One similarity-search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Exact-match metadata filter: every listed key must equal the listed
/// value for a record to qualify.
pub type MetadataFilter = Map<String, Value>;

/// Capability contract the core requires of a vector-index backend.
///
/// Semantics adapters must honor:
/// - `upsert` overwrites silently; it is its own update primitive.
/// - `remove` is idempotent (`Ok` on an absent id), so a compensating
///   removal can be retried safely.
/// - Connectivity failures surface as [`BackendError::Unavailable`].
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<(), BackendError>;

    async fn fetch(&self, namespace: &str, id: &str) -> Result<Option<VectorRecord>, BackendError>;

    /// Top-`top_k` records by similarity to `query`, optionally
    /// constrained by an exact-match metadata filter.
    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        filter: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, BackendError>;

    async fn remove(&self, namespace: &str, id: &str) -> Result<(), BackendError>;

    /// Drop a namespace and everything in it. `Ok` if already absent.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), BackendError>;
}
