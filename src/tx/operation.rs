//! Transaction operations and their compensations.
//!
//! A [`TxOperation`] pairs a forward action with the inverse action that
//! undoes it, captured up front, including any pre-state the inverse
//! needs (the prior record for an update, for example). The coordinator
//! never derives an inverse after the fact.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::error::BackendError;
use crate::port::{BackendId, GraphEdge, GraphNode, VectorRecord};

/// Opaque transaction identifier, `txn_` followed by 16 hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TransactionId(String);

impl TransactionId {
    pub(crate) fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("txn_{}", &hex[..16]))
    }

    /// Get the transaction id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an operation does, for reporting and reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationKind {
    CreateNode,
    CreateEdge,
    UpsertVector,
    UpdateVector,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateNode => "create-node",
            Self::CreateEdge => "create-edge",
            Self::UpsertVector => "upsert-vector",
            Self::UpdateVector => "update-vector",
        };
        write!(f, "{name}")
    }
}

/// A single call against the graph backend.
#[derive(Debug, Clone)]
pub enum GraphAction {
    AddNode(GraphNode),
    AddEdge(GraphEdge),
    RemoveNode { id: String },
    RemoveEdge { id: String },
}

/// A single call against the vector backend.
#[derive(Debug, Clone)]
pub enum VectorAction {
    Upsert(VectorRecord),
    Remove { id: String },
}

/// A backend call, forward or compensating.
///
/// Actions carry no namespace: the coordinator derives it from the
/// transaction's tenant, so an operation cannot name another tenant's
/// partition.
#[derive(Debug, Clone)]
pub enum Action {
    Graph(GraphAction),
    Vector(VectorAction),
}

impl Action {
    pub fn backend(&self) -> BackendId {
        match self {
            Self::Graph(_) => BackendId::Graph,
            Self::Vector(_) => BackendId::Vector,
        }
    }
}

/// One operation in a transaction: a forward action plus the inverse that
/// undoes it.
#[derive(Debug, Clone)]
pub struct TxOperation {
    pub(crate) kind: OperationKind,
    pub(crate) target_key: String,
    pub(crate) forward: Action,
    pub(crate) inverse: Action,
}

impl TxOperation {
    /// Create a node; undone by removing it.
    pub fn create_node(node: GraphNode) -> Self {
        let id = node.id.clone();
        Self {
            kind: OperationKind::CreateNode,
            target_key: id.clone(),
            forward: Action::Graph(GraphAction::AddNode(node)),
            inverse: Action::Graph(GraphAction::RemoveNode { id }),
        }
    }

    /// Create an edge; undone by removing it.
    pub fn create_edge(edge: GraphEdge) -> Self {
        let id = edge.id.clone();
        Self {
            kind: OperationKind::CreateEdge,
            target_key: id.clone(),
            forward: Action::Graph(GraphAction::AddEdge(edge)),
            inverse: Action::Graph(GraphAction::RemoveEdge { id }),
        }
    }

    /// Insert a fresh vector; undone by removing it.
    ///
    /// Only correct when no record with this id exists yet; for an
    /// in-place update use [`update_vector`](Self::update_vector), which
    /// restores the prior record instead of deleting.
    pub fn upsert_vector(record: VectorRecord) -> Self {
        let id = record.id.clone();
        Self {
            kind: OperationKind::UpsertVector,
            target_key: id.clone(),
            forward: Action::Vector(VectorAction::Upsert(record)),
            inverse: Action::Vector(VectorAction::Remove { id }),
        }
    }

    /// Overwrite an existing vector; undone by re-upserting the captured
    /// prior record.
    pub fn update_vector(record: VectorRecord, previous: VectorRecord) -> Self {
        Self {
            kind: OperationKind::UpdateVector,
            target_key: record.id.clone(),
            forward: Action::Vector(VectorAction::Upsert(record)),
            inverse: Action::Vector(VectorAction::Upsert(previous)),
        }
    }

    pub fn backend(&self) -> BackendId {
        self.forward.backend()
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn target_key(&self) -> &str {
        &self.target_key
    }
}

/// Log entry for one successfully applied forward operation.
///
/// Lives only for its transaction; replayed in reverse order to build the
/// rollback plan.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub backend: BackendId,
    pub kind: OperationKind,
    pub target_key: String,
    pub(crate) inverse: Action,
}

/// An operation whose compensation failed after bounded retries.
///
/// Still applied on its backend; listed for manual reconciliation.
#[derive(Debug, Clone)]
pub struct UncompensatedOperation {
    pub backend: BackendId,
    pub kind: OperationKind,
    pub target_key: String,
    pub error: BackendError,
}

impl fmt::Display for UncompensatedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on {}: {}",
            self.kind, self.target_key, self.backend, self.error
        )
    }
}
