// orgtree/src/store/mem_store.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::common::NodeId;
use crate::error::{StoreError, StoreResult};
use crate::node::{Node, NodePatch, NodeRecord};
use crate::path::NodePath;
use super::tree_store::{DepthFilter, StoreChange, TreeStore};

const CHANGE_FEED_CAPACITY: usize = 1024;

/// One applied write, in the order the store acknowledged it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    Created { id: NodeId, path: NodePath },
    Updated { id: NodeId, from: NodePath, to: NodePath },
    Deleted { id: NodeId, path: NodePath },
}

#[derive(Debug)]
pub struct InMemoryStoreInner {
    records: HashMap<NodeId, NodeRecord>,
    next_id: u64,
    reads: u64,
    writes: u64,
    /// Writes still allowed before injected failures start.
    writes_before_failure: Option<u64>,
    write_delay: Option<Duration>,
    write_log: Vec<WriteEvent>,
    collisions: Vec<NodePath>,
}

impl Default for InMemoryStoreInner {
    fn default() -> Self {
        InMemoryStoreInner {
            records: HashMap::new(),
            next_id: 1,
            reads: 0,
            writes: 0,
            writes_before_failure: None,
            write_delay: None,
            write_log: Vec::new(),
            collisions: Vec::new(),
        }
    }
}

impl InMemoryStoreInner {
    fn node(&self, id: &NodeId) -> Option<Node> {
        self.records.get(id).map(|r| Node::new(id.clone(), r.clone()))
    }

    fn nodes_where(&self, pred: impl Fn(&NodeRecord) -> bool) -> Vec<Node> {
        self.records
            .iter()
            .filter(|(_, r)| pred(r))
            .map(|(id, r)| Node::new(id.clone(), r.clone()))
            .collect()
    }

    /// Counts the write and fails it if failure injection says so.
    fn admit_write(&mut self) -> StoreResult<()> {
        self.writes += 1;
        match self.writes_before_failure.as_mut() {
            Some(0) => Err(StoreError::Unavailable("injected write failure".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn record_collisions(&mut self) {
        let mut seen = HashSet::new();
        for record in self.records.values() {
            if !seen.insert(&record.path) {
                self.collisions.push(record.path.clone());
            }
        }
    }
}

/// An in-memory `TreeStore` implementation using `tokio::sync::RwLock`.
///
/// Besides serving as a reference backend it keeps call counters, a log of
/// applied writes, and every transient path collision it ever held.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<InMemoryStoreInner>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        InMemoryStore {
            inner: Arc::new(RwLock::new(InMemoryStoreInner::default())),
            changes,
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts records directly, bypassing counters and the change feed.
    pub async fn seed(&self, records: Vec<NodeRecord>) -> Vec<NodeId> {
        let mut guard = self.inner.write().await;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = NodeId::new(format!("n{:06}", guard.next_id));
            guard.next_id += 1;
            guard.records.insert(id.clone(), record);
            ids.push(id);
        }
        ids
    }

    pub async fn read_count(&self) -> u64 {
        self.inner.read().await.reads
    }

    pub async fn write_count(&self) -> u64 {
        self.inner.read().await.writes
    }

    pub async fn write_log(&self) -> Vec<WriteEvent> {
        self.inner.read().await.write_log.clone()
    }

    /// Paths that were, at some point after a single write, held by more than
    /// one live record.
    pub async fn observed_collisions(&self) -> Vec<NodePath> {
        self.inner.read().await.collisions.clone()
    }

    /// Lets the next `n` writes through, then fails every write after them.
    pub async fn fail_writes_after(&self, n: u64) {
        self.inner.write().await.writes_before_failure = Some(n);
    }

    pub async fn clear_failures(&self) {
        self.inner.write().await.writes_before_failure = None;
    }

    pub async fn set_write_delay(&self, delay: Option<Duration>) {
        self.inner.write().await.write_delay = delay;
    }

    pub async fn records_for_test(&self) -> HashMap<NodeId, NodeRecord> {
        self.inner.read().await.records.clone()
    }

    /// All live paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let guard = self.inner.read().await;
        let mut paths: Vec<String> = guard.records.values().map(|r| r.path.to_string()).collect();
        paths.sort();
        paths
    }

    fn publish(&self, change: StoreChange) {
        // no subscribers is fine
        let _ = self.changes.send(change);
    }

    async fn delay_write(&self) {
        let delay = self.inner.read().await.write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl TreeStore for InMemoryStore {
    async fn fetch_all(&self) -> StoreResult<Vec<Node>> {
        let mut guard = self.inner.write().await;
        guard.reads += 1;
        Ok(guard.nodes_where(|_| true))
    }

    async fn fetch_by_path(&self, path: &NodePath) -> StoreResult<Option<Node>> {
        let mut guard = self.inner.write().await;
        guard.reads += 1;
        Ok(guard.nodes_where(|r| &r.path == path).into_iter().next())
    }

    async fn fetch_by_depth(&self, filter: DepthFilter) -> StoreResult<Vec<Node>> {
        let mut guard = self.inner.write().await;
        guard.reads += 1;
        Ok(guard.nodes_where(|r| filter.matches(r.depth)))
    }

    async fn fetch_by_id(&self, id: &NodeId) -> StoreResult<Option<Node>> {
        let mut guard = self.inner.write().await;
        guard.reads += 1;
        Ok(guard.node(id))
    }

    async fn create(&self, record: NodeRecord) -> StoreResult<NodeId> {
        self.delay_write().await;
        let mut guard = self.inner.write().await;
        guard.admit_write()?;
        let id = NodeId::new(format!("n{:06}", guard.next_id));
        guard.next_id += 1;
        let path = record.path.clone();
        guard.records.insert(id.clone(), record.clone());
        guard.write_log.push(WriteEvent::Created { id: id.clone(), path });
        guard.record_collisions();
        self.publish(StoreChange::Created(Node::new(id.clone(), record)));
        Ok(id)
    }

    async fn update(&self, id: &NodeId, patch: NodePatch) -> StoreResult<()> {
        self.delay_write().await;
        let mut guard = self.inner.write().await;
        guard.admit_write()?;
        let record = guard
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let from = record.path.clone();
        record.apply(&patch);
        let to = record.path.clone();
        let updated = Node::new(id.clone(), record.clone());
        guard.write_log.push(WriteEvent::Updated { id: id.clone(), from, to });
        guard.record_collisions();
        self.publish(StoreChange::Updated(updated));
        Ok(())
    }

    async fn delete(&self, id: &NodeId) -> StoreResult<()> {
        self.delay_write().await;
        let mut guard = self.inner.write().await;
        guard.admit_write()?;
        let record = guard
            .records
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        guard.write_log.push(WriteEvent::Deleted { id: id.clone(), path: record.path });
        self.publish(StoreChange::Deleted(id.clone()));
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StoreChange>> {
        Some(self.changes.subscribe())
    }
}
