//! Cross-store transaction coordination.
//!
//! The two backends share no transaction protocol, so all-or-nothing
//! semantics come from compensating actions: forward operations apply in
//! submission order, each one's inverse is logged, and on the first
//! failure the log replays in exact reverse order. Compensations that
//! fail retry with bounded exponential backoff; whatever still cannot be
//! undone is reported, never hidden.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::CompensationConfig;
use crate::error::{BackendError, TransactionError};
use crate::identity::{IdentityContext, TenantId};
use crate::namespace::{component, NamespaceResolver};
use crate::port::{GraphStore, VectorStore};
use crate::tx::operation::{
    Action, GraphAction, OperationRecord, TransactionId, TxOperation, UncompensatedOperation,
    VectorAction,
};

/// Transaction lifecycle states.
///
/// `Committed`, `RolledBack` and `Failed` are terminal; `RollingBack` is
/// only observable while compensation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionState {
    Pending,
    RollingBack,
    Committed,
    RolledBack,
    Failed,
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::RollingBack => "rolling-back",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Journal entry for a transaction lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionEvent {
    pub transaction_id: TransactionId,
    pub tenant_id: String,
    pub event: &'static str,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Summary of a committed transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionReport {
    pub transaction_id: TransactionId,
    pub tenant_id: String,
    pub state: TransactionState,
    pub operations_applied: usize,
    pub began_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

const JOURNAL_CAPACITY: usize = 1000;

/// Executes ordered operation batches against both backends as a single
/// logical unit.
///
/// Stateless across transactions apart from observability bookkeeping:
/// each transaction owns a private log, and concurrent transactions run
/// without any cross-transaction locking. Two transactions touching the
/// same key race at the backend's own consistency level; the coordinator
/// adds nothing on top.
pub struct TransactionCoordinator {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    compensation: CompensationConfig,
    active: AtomicUsize,
    journal: Mutex<VecDeque<TransactionEvent>>,
}

impl TransactionCoordinator {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        compensation: CompensationConfig,
    ) -> Self {
        Self {
            graph,
            vector,
            compensation,
            active: AtomicUsize::new(0),
            journal: Mutex::new(VecDeque::with_capacity(JOURNAL_CAPACITY)),
        }
    }

    /// Begin a transaction for the context's bound tenant.
    ///
    /// Fails with [`NoIdentityBound`](crate::error::IdentityError::NoIdentityBound)
    /// on an unbound context: transactions write data, so the default
    /// sentinel is never substituted here.
    pub fn begin(&self, ctx: &IdentityContext) -> Result<Transaction<'_>, crate::error::IdentityError> {
        let tenant = ctx.require_tenant()?.clone();
        let id = TransactionId::generate();
        let began_at = Utc::now();

        self.active.fetch_add(1, Ordering::Relaxed);
        debug!(transaction_id = %id, tenant_id = %tenant, "transaction begun");
        self.record_event(&id, tenant.as_str(), "begin", None);

        Ok(Transaction {
            coordinator: self,
            id,
            graph_namespace: NamespaceResolver::namespace_for(tenant.as_str(), component::GRAPH),
            vector_namespace: NamespaceResolver::namespace_for(
                tenant.as_str(),
                component::EMBEDDINGS,
            ),
            tenant,
            state: TransactionState::Pending,
            log: Vec::new(),
            began_at,
        })
    }

    /// Run an ordered batch as one transaction: all operations commit, or
    /// everything applied so far is rolled back and the triggering error
    /// surfaces in the result.
    pub async fn run(
        &self,
        ctx: &IdentityContext,
        operations: Vec<TxOperation>,
    ) -> crate::error::Result<TransactionReport> {
        let mut tx = self.begin(ctx)?;
        for operation in operations {
            if let Err(cause) = tx.apply(operation).await {
                return Err(tx.rollback(cause).await.into());
            }
        }
        Ok(tx.commit())
    }

    /// Number of transactions currently between `begin` and a terminal
    /// state.
    pub fn active_transactions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Most recent lifecycle events, newest last.
    pub fn recent_events(&self, limit: usize) -> Vec<TransactionEvent> {
        let journal = self.journal.lock();
        journal
            .iter()
            .skip(journal.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    fn record_event(
        &self,
        transaction_id: &TransactionId,
        tenant_id: &str,
        event: &'static str,
        detail: Option<String>,
    ) {
        let mut journal = self.journal.lock();
        if journal.len() == JOURNAL_CAPACITY {
            journal.pop_front();
        }
        journal.push_back(TransactionEvent {
            transaction_id: transaction_id.clone(),
            tenant_id: tenant_id.to_string(),
            event,
            detail,
            at: Utc::now(),
        });
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("active", &self.active_transactions())
            .finish()
    }
}

/// One in-flight unit of work.
///
/// Forward operations apply strictly in [`apply`](Self::apply) order; the
/// inverse of each applied operation is logged before the next one
/// starts. Consume with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
///
/// Dropping a transaction, including cancelling a future that owns one,
/// rolls nothing back: abandonment means "stop submitting", and a caller
/// that cannot tolerate partial application must call `rollback`
/// explicitly.
pub struct Transaction<'c> {
    coordinator: &'c TransactionCoordinator,
    id: TransactionId,
    tenant: TenantId,
    graph_namespace: String,
    vector_namespace: String,
    state: TransactionState,
    log: Vec<OperationRecord>,
    began_at: DateTime<Utc>,
}

impl Transaction<'_> {
    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Number of forward operations applied so far.
    pub fn operations_applied(&self) -> usize {
        self.log.len()
    }

    /// Execute one forward operation and log its inverse.
    ///
    /// On failure nothing is logged for this operation and the
    /// transaction stays pending; the caller decides between
    /// [`rollback`](Self::rollback) and retrying with a different
    /// operation.
    pub async fn apply(&mut self, operation: TxOperation) -> Result<(), BackendError> {
        let record = OperationRecord {
            backend: operation.backend(),
            kind: operation.kind,
            target_key: operation.target_key.clone(),
            inverse: operation.inverse.clone(),
        };

        if let Err(err) = self.execute(&operation.forward).await {
            warn!(
                transaction_id = %self.id,
                tenant_id = %self.tenant,
                kind = %operation.kind,
                target_key = %operation.target_key,
                %err,
                "forward operation failed"
            );
            return Err(err);
        }

        self.log.push(record);
        Ok(())
    }

    /// Commit: every submitted operation applied.
    pub fn commit(mut self) -> TransactionReport {
        self.state = TransactionState::Committed;
        let completed_at = Utc::now();
        info!(
            transaction_id = %self.id,
            tenant_id = %self.tenant,
            operations = self.log.len(),
            "transaction committed"
        );
        self.coordinator.record_event(
            &self.id,
            self.tenant.as_str(),
            "commit",
            Some(format!("{} operation(s)", self.log.len())),
        );
        TransactionReport {
            transaction_id: self.id.clone(),
            tenant_id: self.tenant.to_string(),
            state: TransactionState::Committed,
            operations_applied: self.log.len(),
            began_at: self.began_at,
            completed_at,
        }
    }

    /// Replay the operation log in exact reverse order, compensating
    /// every applied operation.
    ///
    /// Each failing compensation retries with bounded exponential
    /// backoff. Returns [`TransactionError::RolledBack`] when every
    /// compensation succeeded, or [`TransactionError::PartialRollback`]
    /// listing what is still applied; partial inconsistency is surfaced,
    /// never swallowed.
    pub async fn rollback(mut self, cause: BackendError) -> TransactionError {
        self.state = TransactionState::RollingBack;
        warn!(
            transaction_id = %self.id,
            tenant_id = %self.tenant,
            applied = self.log.len(),
            %cause,
            "rolling back transaction"
        );

        let mut uncompensated = Vec::new();
        for record in self.log.iter().rev() {
            if let Err(err) = self.compensate(record).await {
                uncompensated.push(UncompensatedOperation {
                    backend: record.backend,
                    kind: record.kind,
                    target_key: record.target_key.clone(),
                    error: err,
                });
            }
        }

        if uncompensated.is_empty() {
            self.state = TransactionState::RolledBack;
            info!(
                transaction_id = %self.id,
                tenant_id = %self.tenant,
                "transaction rolled back cleanly"
            );
            self.coordinator.record_event(
                &self.id,
                self.tenant.as_str(),
                "rolled-back",
                Some(cause.to_string()),
            );
            TransactionError::RolledBack {
                transaction_id: self.id.clone(),
                tenant_id: self.tenant.to_string(),
                cause,
            }
        } else {
            self.state = TransactionState::Failed;
            error!(
                transaction_id = %self.id,
                tenant_id = %self.tenant,
                uncompensated = uncompensated.len(),
                "rollback left un-compensated operations; manual reconciliation required"
            );
            self.coordinator.record_event(
                &self.id,
                self.tenant.as_str(),
                "failed",
                Some(format!(
                    "{} un-compensated operation(s)",
                    uncompensated.len()
                )),
            );
            TransactionError::PartialRollback {
                transaction_id: self.id.clone(),
                tenant_id: self.tenant.to_string(),
                uncompensated,
                cause,
            }
        }
    }

    /// Invoke one record's inverse action, retrying transient failures
    /// with exponential backoff up to the configured attempt cap.
    async fn compensate(&self, record: &OperationRecord) -> Result<(), BackendError> {
        let config = &self.coordinator.compensation;
        let mut delay_ms = config.initial_delay_ms;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.execute(&record.inverse).await {
                Ok(()) => {
                    debug!(
                        transaction_id = %self.id,
                        kind = %record.kind,
                        target_key = %record.target_key,
                        attempt,
                        "compensated operation"
                    );
                    return Ok(());
                }
                Err(err) if attempt >= config.max_attempts => return Err(err),
                Err(err) => {
                    warn!(
                        transaction_id = %self.id,
                        kind = %record.kind,
                        target_key = %record.target_key,
                        attempt,
                        delay_ms,
                        %err,
                        "compensation failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = ((delay_ms as f64 * config.backoff_multiplier) as u64)
                        .min(config.max_delay_ms);
                }
            }
        }
    }

    async fn execute(&self, action: &Action) -> Result<(), BackendError> {
        match action {
            Action::Graph(graph_action) => {
                let store = &self.coordinator.graph;
                let ns = &self.graph_namespace;
                match graph_action {
                    GraphAction::AddNode(node) => store.add_node(ns, node.clone()).await,
                    GraphAction::AddEdge(edge) => store.add_edge(ns, edge.clone()).await,
                    GraphAction::RemoveNode { id } => store.remove_node(ns, id).await,
                    GraphAction::RemoveEdge { id } => store.remove_edge(ns, id).await,
                }
            }
            Action::Vector(vector_action) => {
                let store = &self.coordinator.vector;
                let ns = &self.vector_namespace;
                match vector_action {
                    VectorAction::Upsert(record) => store.upsert(ns, record.clone()).await,
                    VectorAction::Remove { id } => store.remove(ns, id).await,
                }
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.coordinator.active.fetch_sub(1, Ordering::Relaxed);
        if matches!(
            self.state,
            TransactionState::Pending | TransactionState::RollingBack
        ) {
            debug!(
                transaction_id = %self.id,
                tenant_id = %self.tenant,
                applied = self.log.len(),
                "transaction abandoned without terminal state; nothing rolled back"
            );
            self.coordinator.record_event(
                &self.id,
                self.tenant.as_str(),
                "abandoned",
                Some(format!("{} operation(s) applied", self.log.len())),
            );
        }
    }
}
