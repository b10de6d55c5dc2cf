//! Saga-style transactions across the graph and vector backends.

mod coordinator;
mod operation;

pub use coordinator::{
    Transaction, TransactionCoordinator, TransactionEvent, TransactionReport, TransactionState,
};
pub use operation::{
    Action, GraphAction, OperationKind, OperationRecord, TransactionId, TxOperation,
    UncompensatedOperation, VectorAction,
};
