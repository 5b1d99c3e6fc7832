use std::sync::Arc;

use log::warn;

use crate::common::{EngineConfig, NodeId};
use crate::directory::{ActorProvider, Anonymous, DisplayNameResolver};
use crate::error::{Result, TreeError};
use crate::node::{Node, NodePayload};
use crate::path::NodePath;
use crate::platform::PlatformStore;

use super::coordinator::OperationCoordinator;
use super::mutator::TreeMutator;
use super::queries::TreeQueries;
use super::types::{InvariantViolation, MovePosition, OperationReport, SiblingPosition, SiblingSide};

/// The organisational tree over one store: queries plus serialized mutations.
#[derive(Debug)]
pub struct OrgTree<S: PlatformStore> {
    queries: Arc<TreeQueries<S>>,
    mutator: TreeMutator<S>,
    config: EngineConfig,
}

impl<S: PlatformStore> OrgTree<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self> {
        Self::with_actor(store, config, Arc::new(Anonymous))
    }

    /// Like [`new`](Self::new), stamping every write with `actor`.
    pub fn with_actor(store: Arc<S>, config: EngineConfig, actor: Arc<dyn ActorProvider>) -> Result<Self> {
        config.validate()?;
        let queries = Arc::new(TreeQueries::new(Arc::clone(&store), config.clone()));
        let coordinator = OperationCoordinator::new(store, config.clone(), actor);
        let mutator = TreeMutator::new(Arc::clone(&queries), coordinator);
        Ok(OrgTree { queries, mutator, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn queries(&self) -> &TreeQueries<S> {
        &self.queries
    }

    /// Level labels configured for this deployment.
    pub fn levels(&self) -> &[String] {
        &self.config.levels
    }

    // --- reads ---

    pub async fn get_tree(&self) -> Result<Vec<Node>> {
        self.queries.get_tree().await
    }

    pub async fn get_root(&self) -> Result<Node> {
        let snapshot = self.queries.snapshot().await?;
        snapshot.root().cloned().ok_or(TreeError::EmptyTree)
    }

    pub async fn get_node_by_id(&self, id: &NodeId) -> Result<Option<Node>> {
        self.queries.get_node_by_id(id).await
    }

    pub async fn get_node_by_path(&self, path: &NodePath) -> Result<Option<Node>> {
        self.queries.get_node_by_path(path).await
    }

    pub async fn get_children(&self, node: &Node) -> Result<Vec<Node>> {
        self.queries.get_children(node).await
    }

    pub async fn get_descendants(&self, node: &Node) -> Result<Vec<Node>> {
        self.queries.get_descendants(node).await
    }

    pub async fn get_siblings(&self, node: &Node, side: Option<SiblingSide>) -> Result<Vec<Node>> {
        self.queries.get_siblings(node, side).await
    }

    /// Siblings on `side`, keeping `node` itself when `include_self` is set.
    pub async fn get_siblings_with(
        &self,
        node: &Node,
        side: Option<SiblingSide>,
        include_self: bool,
    ) -> Result<Vec<Node>> {
        self.queries.get_siblings_with(node, side, include_self).await
    }

    pub async fn get_parent(&self, node: &Node) -> Result<Option<Node>> {
        self.queries.get_parent(node).await
    }

    /// Pre-order listing paired with each leader's display name. Lookup
    /// failures leave the name empty rather than failing the listing.
    pub async fn labeled_tree<R: DisplayNameResolver + ?Sized>(
        &self,
        resolver: &R,
    ) -> Result<Vec<(Node, Option<String>)>> {
        let nodes = self.queries.get_tree().await?;
        let mut labeled = Vec::with_capacity(nodes.len());
        for node in nodes {
            let name = match node.payload().leader_ref.as_deref() {
                Some(leader) => resolver.display_name(leader).await.unwrap_or_else(|e| {
                    warn!("Could not resolve leader {} of {}: {}.", leader, node.id, e);
                    None
                }),
                None => None,
            };
            labeled.push((node, name));
        }
        Ok(labeled)
    }

    pub async fn outline(&self) -> Result<String> {
        Ok(self.queries.snapshot().await?.outline())
    }

    /// Every invariant the stored tree currently violates, read fresh.
    pub async fn check_invariants(&self) -> Result<Vec<InvariantViolation>> {
        let violations = self.queries.refresh().await?.check_invariants();
        for violation in &violations {
            warn!("Invariant violated: {}.", violation);
        }
        Ok(violations)
    }

    // --- mutations ---

    pub async fn insert_root(&self, payload: NodePayload) -> Result<Node> {
        self.mutator.insert_root(payload).await
    }

    pub async fn insert_child(&self, parent: &Node, payload: NodePayload) -> Result<Node> {
        self.mutator.insert_child(parent, payload).await
    }

    pub async fn insert_sibling(&self, target: &Node, position: SiblingPosition, payload: NodePayload) -> Result<Node> {
        self.mutator.insert_sibling(target, position, payload).await
    }

    pub async fn remove(&self, node: &Node) -> Result<OperationReport> {
        self.mutator.remove(node).await
    }

    pub async fn move_node(&self, node: &Node, target: &Node, position: MovePosition) -> Result<OperationReport> {
        self.mutator.move_node(node, target, position).await
    }

    pub async fn update_payload(&self, node: &Node, payload: NodePayload) -> Result<Node> {
        self.mutator.update_payload(node, payload).await
    }
}
