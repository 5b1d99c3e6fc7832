use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;

use crate::error::{Result, TreeError};
use crate::node::{Node, NodePayload};
use crate::platform::PlatformStore;

use super::coordinator::OperationCoordinator;
use super::plan;
use super::queries::TreeQueries;
use super::snapshot::TreeSnapshot;
use super::types::{MovePosition, OperationKind, OperationReport, SiblingPosition, WriteOp, WritePlan, WriteStep};

/// Structural mutations.
///
/// Each call takes the mutation gate, re-reads the tree, plans the complete
/// ordered write list (all validation happens here, before any write), and
/// hands the plan to the coordinator. Nodes passed in are resolved again by id,
/// so a stale copy with an outdated path is fine.
#[derive(Debug)]
pub struct TreeMutator<S: PlatformStore> {
    queries: Arc<TreeQueries<S>>,
    coordinator: OperationCoordinator<S>,
    gate: Mutex<()>,
}

impl<S: PlatformStore> TreeMutator<S> {
    pub fn new(queries: Arc<TreeQueries<S>>, coordinator: OperationCoordinator<S>) -> Self {
        TreeMutator {
            queries,
            coordinator,
            gate: Mutex::new(()),
        }
    }

    async fn run<F>(&self, plan_fn: F) -> Result<OperationReport>
    where
        F: FnOnce(&TreeSnapshot) -> Result<WritePlan>,
    {
        let _serialized = self.gate.lock().await;
        let snapshot = self.queries.refresh().await?;
        let plan = plan_fn(&snapshot)?;
        if plan.is_empty() {
            return Ok(OperationReport {
                operation: plan.operation,
                writes_applied: 0,
                created: None,
            });
        }
        let result = self.coordinator.execute(plan).await;
        // whatever got applied, the cached copy is now behind
        self.queries.invalidate().await;
        result
    }

    fn created(report: OperationReport) -> Result<Node> {
        report.created.ok_or_else(|| {
            TreeError::InconsistentTree(format!("{} acknowledged without creating a node", report.operation))
        })
    }

    pub async fn insert_root(&self, payload: NodePayload) -> Result<Node> {
        let report = self.run(|snap| plan::plan_insert_root(snap, payload)).await?;
        Self::created(report)
    }

    /// Appends a new rightmost child under `parent`.
    pub async fn insert_child(&self, parent: &Node, payload: NodePayload) -> Result<Node> {
        let report = self
            .run(|snap| plan::plan_insert_child(snap, &parent.id, payload))
            .await?;
        Self::created(report)
    }

    pub async fn insert_sibling(
        &self,
        target: &Node,
        position: SiblingPosition,
        payload: NodePayload,
    ) -> Result<Node> {
        let report = self
            .run(|snap| plan::plan_insert_sibling(snap, &target.id, position, payload))
            .await?;
        Self::created(report)
    }

    /// Removes `node` and its whole subtree, then closes the gap it leaves.
    pub async fn remove(&self, node: &Node) -> Result<OperationReport> {
        self.run(|snap| plan::plan_remove(snap, &node.id)).await
    }

    pub async fn move_node(
        &self,
        node: &Node,
        target: &Node,
        position: MovePosition,
    ) -> Result<OperationReport> {
        debug!("Move {} {:?} {}.", node.id, position, target.id);
        self.run(|snap| plan::plan_move(snap, &node.id, &target.id, position)).await
    }

    /// Rewrites title, leader and level of `node`; position is untouched.
    pub async fn update_payload(&self, node: &Node, payload: NodePayload) -> Result<Node> {
        let mut updated: Option<Node> = None;
        self.run(|snap| {
            let current = snap
                .get(&node.id)
                .ok_or_else(|| TreeError::NodeNotFound(node.id.to_string()))?;
            let mut next = current.clone();
            next.record.payload = payload.clone();
            updated = Some(next);
            let mut plan = WritePlan::new(OperationKind::UpdatePayload);
            plan.push(WriteStep::single(WriteOp::Edit {
                id: current.id.clone(),
                path: current.path().clone(),
                payload,
            }));
            Ok(plan)
        })
        .await?;
        updated.ok_or_else(|| TreeError::NodeNotFound(node.id.to_string()))
    }
}
