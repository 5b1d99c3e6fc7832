// orgtree/src/store/tree_store.rs

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::common::NodeId;
use crate::error::StoreResult;
use crate::node::{Node, NodePatch, NodeRecord};
use crate::path::NodePath;

/// Depth predicate for range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFilter {
    Exact(u32),
    AtLeast(u32),
    Between { min: u32, max: u32 },
}

impl DepthFilter {
    pub fn matches(&self, depth: u32) -> bool {
        match *self {
            DepthFilter::Exact(d) => depth == d,
            DepthFilter::AtLeast(min) => depth >= min,
            DepthFilter::Between { min, max } => depth >= min && depth <= max,
        }
    }
}

/// A change observed on the store, used to patch read caches.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Created(Node),
    Updated(Node),
    Deleted(NodeId),
}

/// Trait for the remote key-value store holding one record per node.
///
/// Every call is independent: there is no multi-record atomicity, and a reader
/// may observe a subtree while a mutation is half applied.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait TreeStore: std::fmt::Debug + 'static {
    async fn fetch_all(&self) -> StoreResult<Vec<Node>>;

    /// Returns `Ok(None)` if no record has this exact path.
    async fn fetch_by_path(&self, path: &NodePath) -> StoreResult<Option<Node>>;

    async fn fetch_by_depth(&self, filter: DepthFilter) -> StoreResult<Vec<Node>>;

    async fn fetch_by_id(&self, id: &NodeId) -> StoreResult<Option<Node>>;

    /// Stores a new record and returns the id the store assigned to it.
    async fn create(&self, record: NodeRecord) -> StoreResult<NodeId>;

    async fn update(&self, id: &NodeId, patch: NodePatch) -> StoreResult<()>;

    async fn delete(&self, id: &NodeId) -> StoreResult<()>;

    /// Optional feed of remote changes. Stores without one return `None` and
    /// readers fall back to re-fetching.
    fn subscribe(&self) -> Option<broadcast::Receiver<StoreChange>> {
        None
    }
}
