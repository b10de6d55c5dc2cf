//! Backend port traits.
//!
//! Each trait lists exactly the operations the core needs from a backing
//! store; nothing is forwarded implicitly, so an adapter cannot be
//! reached around the tenant validation layer through a method nobody
//! thought to wrap.

pub mod graph;
pub mod vector;

pub use graph::{GraphEdge, GraphNode, GraphStore, Subgraph};
pub use vector::{MetadataFilter, SearchHit, VectorRecord, VectorStore};

use std::fmt;

use serde::Serialize;

/// The two backing stores the coordinator sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendId {
    Graph,
    Vector,
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph => write!(f, "graph-store"),
            Self::Vector => write!(f, "vector-store"),
        }
    }
}
