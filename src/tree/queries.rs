use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::common::{EngineConfig, NodeId};
use crate::error::Result;
use crate::node::Node;
use crate::path::NodePath;
use crate::platform::PlatformStore;
use crate::store::{DepthFilter, StoreChange};

use super::snapshot::TreeSnapshot;
use super::types::SiblingSide;

fn sorted(mut nodes: Vec<Node>) -> Vec<Node> {
    nodes.sort_by(|a, b| a.path().cmp(b.path()));
    nodes
}

/// Read side of the engine.
///
/// When `cache_reads` is on, queries are answered from an owned
/// [`TreeSnapshot`] that is filled by a full fetch and kept current either by
/// patches from the store's change feed or by invalidation after local
/// mutations. With the cache off, each query maps onto the narrowest store
/// query that can answer it.
#[derive(Debug)]
pub struct TreeQueries<S: PlatformStore> {
    store: Arc<S>,
    config: EngineConfig,
    cache: RwLock<Option<Arc<TreeSnapshot>>>,
    changes: Mutex<Option<broadcast::Receiver<StoreChange>>>,
}

impl<S: PlatformStore> TreeQueries<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let changes = if config.cache_reads { store.subscribe() } else { None };
        TreeQueries {
            store,
            config,
            cache: RwLock::new(None),
            changes: Mutex::new(changes),
        }
    }

    /// Fetches every node and rebuilds the snapshot, bypassing the cache.
    pub async fn refresh(&self) -> Result<Arc<TreeSnapshot>> {
        // anything already queued on the feed predates this fetch
        self.drain_feed().await;
        let nodes = self.store.fetch_all().await?;
        let snapshot = Arc::new(TreeSnapshot::new(nodes));
        debug!("TreeQueries: fetched snapshot of {} nodes.", snapshot.len());
        if self.config.cache_reads {
            *self.cache.write().await = Some(Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    /// The cached snapshot, fetching it first if needed. Without caching this
    /// is always a fresh fetch.
    pub async fn snapshot(&self) -> Result<Arc<TreeSnapshot>> {
        if self.config.cache_reads {
            self.sync_changes().await;
            if let Some(snapshot) = self.cache.read().await.as_ref() {
                return Ok(Arc::clone(snapshot));
            }
        }
        self.refresh().await
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        trace!("TreeQueries: cache invalidated.");
    }

    /// Applies every change queued on the store's feed to the cached snapshot.
    /// A lagging feed drops the cache instead.
    pub async fn sync_changes(&self) {
        let mut feed = self.changes.lock().await;
        let Some(receiver) = feed.as_mut() else { return };
        let mut cache = self.cache.write().await;
        loop {
            match receiver.try_recv() {
                Ok(change) => {
                    if let Some(snapshot) = cache.as_mut() {
                        Arc::make_mut(snapshot).apply(&change);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("TreeQueries: change feed lagged by {} events, dropping cache.", missed);
                    *cache = None;
                }
                Err(TryRecvError::Closed) => {
                    warn!("TreeQueries: change feed closed, falling back to re-fetching.");
                    *cache = None;
                    *feed = None;
                    break;
                }
            }
        }
    }

    async fn drain_feed(&self) {
        let mut feed = self.changes.lock().await;
        if let Some(receiver) = feed.as_mut() {
            while receiver.try_recv().is_ok() {}
        }
    }

    fn cached(&self) -> bool {
        self.config.cache_reads
    }

    /// Every node in pre-order.
    pub async fn get_tree(&self) -> Result<Vec<Node>> {
        if self.cached() {
            return Ok(self.snapshot().await?.nodes().to_vec());
        }
        Ok(sorted(self.store.fetch_all().await?))
    }

    pub async fn get_node_by_id(&self, id: &NodeId) -> Result<Option<Node>> {
        if self.cached() {
            return Ok(self.snapshot().await?.get(id).cloned());
        }
        Ok(self.store.fetch_by_id(id).await?)
    }

    pub async fn get_node_by_path(&self, path: &NodePath) -> Result<Option<Node>> {
        if self.cached() {
            return Ok(self.snapshot().await?.get_by_path(path).cloned());
        }
        Ok(self.store.fetch_by_path(path).await?)
    }

    pub async fn get_children(&self, node: &Node) -> Result<Vec<Node>> {
        if self.cached() {
            let snapshot = self.snapshot().await?;
            return Ok(snapshot.children(node).into_iter().cloned().collect());
        }
        let candidates = self
            .store
            .fetch_by_depth(DepthFilter::Exact(node.path().depth() + 1))
            .await?;
        Ok(sorted(
            candidates
                .into_iter()
                .filter(|n| n.path().parent().as_ref() == Some(node.path()))
                .collect(),
        ))
    }

    pub async fn get_descendants(&self, node: &Node) -> Result<Vec<Node>> {
        if self.cached() {
            return Ok(self.snapshot().await?.descendants(node).to_vec());
        }
        let candidates = self
            .store
            .fetch_by_depth(DepthFilter::AtLeast(node.path().depth() + 1))
            .await?;
        Ok(sorted(
            candidates
                .into_iter()
                .filter(|n| n.path().is_descendant_of(node.path()))
                .collect(),
        ))
    }

    /// Siblings sharing `node`'s parent, optionally only those strictly left
    /// or right of it.
    pub async fn get_siblings(&self, node: &Node, side: Option<SiblingSide>) -> Result<Vec<Node>> {
        self.get_siblings_with(node, side, false).await
    }

    /// Like [`get_siblings`](Self::get_siblings), with `include_self` keeping
    /// the node itself when a side is given.
    pub async fn get_siblings_with(
        &self,
        node: &Node,
        side: Option<SiblingSide>,
        include_self: bool,
    ) -> Result<Vec<Node>> {
        if self.cached() {
            let snapshot = self.snapshot().await?;
            return Ok(snapshot.siblings(node, side, include_self).into_iter().cloned().collect());
        }
        let candidates = self
            .store
            .fetch_by_depth(DepthFilter::Exact(node.path().depth()))
            .await?;
        // same predicate as the snapshot, applied to the depth slice
        let slice = TreeSnapshot::new(candidates);
        Ok(slice.siblings(node, side, include_self).into_iter().cloned().collect())
    }

    /// `None` for the root.
    pub async fn get_parent(&self, node: &Node) -> Result<Option<Node>> {
        let Some(parent_path) = node.path().parent() else {
            return Ok(None);
        };
        self.get_node_by_path(&parent_path).await
    }
}
