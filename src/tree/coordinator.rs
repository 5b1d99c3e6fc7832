use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, trace, warn};

use crate::common::{EngineConfig, NodeId};
use crate::directory::ActorProvider;
use crate::error::{FailedWrite, PartialFailure, Result, StoreError, StoreResult};
use crate::node::{Node, NodePatch};
use crate::platform::{BoxFuture, PlatformStore};

use super::types::{OperationReport, WriteOp, WritePlan, WriteStep};

type WriteOutcome = (WriteOp, StoreResult<Option<NodeId>>);

#[derive(Debug, Default)]
struct StepOutcome {
    applied: Vec<WriteOp>,
    created: Vec<Node>,
    failed: Vec<FailedWrite>,
    unissued: Vec<WriteOp>,
}

/// Issues the writes of one compound operation.
///
/// Steps run strictly one after another: a step starts only once every write
/// of the previous one has been acknowledged. Writes within a step are
/// independent and go out concurrently, at most `max_concurrent_writes` at a
/// time. The first failed write stops the pipeline: nothing further is issued,
/// writes already in flight are awaited, and the whole sequence is reported
/// as a [`PartialFailure`].
#[derive(Debug)]
pub struct OperationCoordinator<S: PlatformStore> {
    store: Arc<S>,
    config: EngineConfig,
    actor: Arc<dyn ActorProvider>,
}

impl<S: PlatformStore> OperationCoordinator<S> {
    pub fn new(store: Arc<S>, config: EngineConfig, actor: Arc<dyn ActorProvider>) -> Self {
        OperationCoordinator { store, config, actor }
    }

    pub async fn execute(&self, plan: WritePlan) -> Result<OperationReport> {
        let operation = plan.operation;
        let total = plan.total_writes();
        debug!("Executing {}: {} writes in {} steps.", operation, total, plan.steps.len());

        let mut completed: Vec<WriteOp> = Vec::with_capacity(total);
        let mut created: Option<Node> = None;
        let mut steps = plan.steps.into_iter();

        while let Some(step) = steps.next() {
            let outcome = self.run_step(step).await;
            completed.extend(outcome.applied);
            if created.is_none() {
                created = outcome.created.into_iter().next();
            }
            if !outcome.failed.is_empty() {
                let mut not_attempted = outcome.unissued;
                not_attempted.extend(steps.flat_map(|s| s.writes));
                let failure = PartialFailure {
                    operation,
                    completed,
                    failed: outcome.failed,
                    not_attempted,
                };
                warn!("{}", failure);
                return Err(failure.into());
            }
        }

        debug!("{} complete: {} writes acknowledged.", operation, completed.len());
        Ok(OperationReport {
            operation,
            writes_applied: completed.len(),
            created,
        })
    }

    async fn run_step(&self, step: WriteStep) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        let mut queue = step.writes.into_iter();
        let mut in_flight: FuturesUnordered<BoxFuture<'_, WriteOutcome>> = FuturesUnordered::new();
        let mut outstanding = 0usize;

        for write in queue.by_ref().take(self.config.max_concurrent_writes) {
            in_flight.push(self.issue(write));
            outstanding += 1;
        }

        while let Some((write, result)) = in_flight.next().await {
            outstanding -= 1;
            match result {
                Ok(id) => {
                    trace!("Acknowledged: {} ({} outstanding).", write, outstanding);
                    if let (Some(id), WriteOp::Create { record }) = (id, &write) {
                        outcome.created.push(Node::new(id, record.clone()));
                    }
                    outcome.applied.push(write);
                }
                Err(error) => {
                    warn!("Write failed: {}: {}.", write, error);
                    outcome.failed.push(FailedWrite { write, error });
                }
            }
            if outcome.failed.is_empty() {
                if let Some(next) = queue.next() {
                    in_flight.push(self.issue(next));
                    outstanding += 1;
                }
            }
        }

        outcome.unissued = queue.collect();
        outcome
    }

    fn issue(&self, write: WriteOp) -> BoxFuture<'_, WriteOutcome> {
        Box::pin(async move {
            trace!("Issuing: {}.", write);
            let result = match self.config.write_timeout() {
                Some(limit) => match tokio::time::timeout(limit, self.apply(&write)).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::Timeout { after_ms: limit.as_millis() as u64 }),
                },
                None => self.apply(&write).await,
            };
            (write, result)
        })
    }

    async fn apply(&self, write: &WriteOp) -> StoreResult<Option<NodeId>> {
        let actor = self.actor.current_actor();
        let now = Utc::now();
        match write {
            WriteOp::Create { record } => {
                let record = record.clone().stamped(actor, now);
                self.store.create(record).await.map(Some)
            }
            WriteOp::Reposition { id, to, .. } => {
                let patch = NodePatch::reposition(to.clone()).stamped(actor, now);
                self.store.update(id, patch).await.map(|_| None)
            }
            WriteOp::Edit { id, payload, .. } => {
                let patch = NodePatch::payload(payload.clone()).stamped(actor, now);
                self.store.update(id, patch).await.map(|_| None)
            }
            WriteOp::Delete { id, .. } => self.store.delete(id).await.map(|_| None),
        }
    }
}
