//! Write planning for compound mutations.
//!
//! Planning is pure: it runs against a [`Layout`] simulated from a snapshot,
//! so every precondition and every index overflow is caught before the first
//! write is issued. Each planned relocation is checked against the simulated
//! layout, which guarantees that applying the steps in order never makes two
//! live records share a path.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::common::NodeId;
use crate::error::{Result, TreeError, ValidationError};
use crate::node::{NodePayload, NodeRecord};
use crate::path::NodePath;

use super::snapshot::TreeSnapshot;
use super::types::{MovePosition, OperationKind, SiblingPosition, WriteOp, WritePlan, WriteStep};

/// Path assignment of every live node, updated as steps are planned.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    by_path: BTreeMap<NodePath, NodeId>,
    by_id: HashMap<NodeId, NodePath>,
}

impl Layout {
    pub(crate) fn from_snapshot(snapshot: &TreeSnapshot) -> Result<Self> {
        let mut by_path = BTreeMap::new();
        let mut by_id = HashMap::new();
        for node in snapshot.nodes() {
            if let Some(other) = by_path.insert(node.path().clone(), node.id.clone()) {
                return Err(TreeError::InconsistentTree(format!(
                    "nodes {} and {} share path {}",
                    other,
                    node.id,
                    node.path()
                )));
            }
            by_id.insert(node.id.clone(), node.path().clone());
        }
        Ok(Layout { by_path, by_id })
    }

    pub(crate) fn path_of(&self, id: &NodeId) -> Result<NodePath> {
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    fn root(&self) -> Option<(&NodePath, &NodeId)> {
        self.by_path.iter().next().filter(|(p, _)| p.is_root())
    }

    /// `root` and all its descendants, in path order.
    fn subtree(&self, root: &NodePath) -> Vec<(NodePath, NodeId)> {
        self.by_path
            .range(root.clone()..)
            .take_while(|(p, _)| *p == root || p.is_descendant_of(root))
            .map(|(p, id)| (p.clone(), id.clone()))
            .collect()
    }

    fn children(&self, parent: &NodePath) -> Vec<(NodePath, NodeId)> {
        let depth = parent.depth() + 1;
        self.subtree(parent)
            .into_iter()
            .filter(|(p, _)| p.depth() == depth)
            .collect()
    }

    fn child_count(&self, parent: &NodePath) -> u32 {
        self.children(parent).len() as u32
    }

    /// Moves the subtree at `from` to `to`, returning the writes that do it.
    /// Fails if any destination path is already taken.
    fn relocate(&mut self, from: &NodePath, to: &NodePath) -> Result<WriteStep> {
        let members = self.subtree(from);
        let mut moves = Vec::with_capacity(members.len());
        for (old, id) in &members {
            let new = old.rebase(from, to).ok_or_else(|| {
                TreeError::InconsistentTree(format!("{old} is not inside subtree {from}"))
            })?;
            moves.push((old.clone(), new, id.clone()));
        }
        for (old, _, _) in &moves {
            self.by_path.remove(old);
        }
        for (_, new, id) in &moves {
            if let Some(holder) = self.by_path.get(new) {
                return Err(TreeError::InconsistentTree(format!(
                    "relocating {from} -> {to} would land on {new}, held by {holder}"
                )));
            }
            self.by_path.insert(new.clone(), id.clone());
            self.by_id.insert(id.clone(), new.clone());
        }
        Ok(WriteStep {
            writes: moves
                .into_iter()
                .map(|(from, to, id)| WriteOp::Reposition { id, from, to })
                .collect(),
        })
    }

    /// Frees slot `at` under `parent` by shifting every child with index
    /// `>= at` one to the right, highest index first.
    fn open_gap(&mut self, parent: &NodePath, at: u32) -> Result<Vec<WriteStep>> {
        let mut shifting: Vec<NodePath> = self
            .children(parent)
            .into_iter()
            .map(|(p, _)| p)
            .filter(|p| p.last_index() >= at)
            .collect();
        shifting.sort_by(|a, b| b.cmp(a));
        let mut steps = Vec::with_capacity(shifting.len());
        for path in shifting {
            let target = path.shift_last_index(1)?;
            steps.push(self.relocate(&path, &target)?);
        }
        Ok(steps)
    }

    /// Closes the hole left at `vacated` under `parent` by shifting every
    /// child with a higher index one to the left, lowest index first.
    fn close_gap(&mut self, parent: &NodePath, vacated: u32) -> Result<Vec<WriteStep>> {
        let shifting: Vec<NodePath> = self
            .children(parent)
            .into_iter()
            .map(|(p, _)| p)
            .filter(|p| p.last_index() > vacated)
            .collect();
        let mut steps = Vec::with_capacity(shifting.len());
        for path in shifting {
            let target = path.shift_last_index(-1)?;
            steps.push(self.relocate(&path, &target)?);
        }
        Ok(steps)
    }

    fn forget_subtree(&mut self, root: &NodePath) {
        for (path, id) in self.subtree(root) {
            self.by_path.remove(&path);
            self.by_id.remove(&id);
        }
    }
}

/// A create of a fresh record at `path`. Fails if a live record already holds
/// the path, which happens when an earlier aborted operation left a gap.
fn create(layout: &Layout, payload: NodePayload, path: NodePath) -> Result<WriteStep> {
    if let Some(holder) = layout.by_path.get(&path) {
        return Err(TreeError::InconsistentTree(format!(
            "new node would land on {path}, held by {holder}"
        )));
    }
    Ok(WriteStep::single(WriteOp::Create { record: NodeRecord::new(payload, path) }))
}

fn log_plan(plan: &WritePlan) {
    debug!(
        "Planned {}: {} writes in {} steps.",
        plan.operation,
        plan.total_writes(),
        plan.steps.len()
    );
}

pub(crate) fn plan_insert_root(snapshot: &TreeSnapshot, payload: NodePayload) -> Result<WritePlan> {
    let layout = Layout::from_snapshot(snapshot)?;
    if let Some((_, id)) = layout.root() {
        return Err(ValidationError::RootExists(id.clone()).into());
    }
    if let Some(node) = snapshot.nodes().first() {
        return Err(TreeError::InconsistentTree(format!(
            "tree has nodes but no root (first is {} at {})",
            node.id,
            node.path()
        )));
    }
    let mut plan = WritePlan::new(OperationKind::InsertRoot);
    plan.push(create(&layout, payload, NodePath::root())?);
    Ok(plan)
}

/// New rightmost child of `parent`.
pub(crate) fn plan_insert_child(
    snapshot: &TreeSnapshot,
    parent: &NodeId,
    payload: NodePayload,
) -> Result<WritePlan> {
    let layout = Layout::from_snapshot(snapshot)?;
    let parent_path = layout.path_of(parent)?;
    let path = parent_path.append_index(layout.child_count(&parent_path) + 1)?;

    let mut plan = WritePlan::new(OperationKind::InsertChild);
    plan.push(create(&layout, payload, path)?);
    log_plan(&plan);
    Ok(plan)
}

/// New node beside `target`. Siblings at or above the new index shift right,
/// highest first, before the node is created in the freed slot.
pub(crate) fn plan_insert_sibling(
    snapshot: &TreeSnapshot,
    target: &NodeId,
    position: SiblingPosition,
    payload: NodePayload,
) -> Result<WritePlan> {
    let mut layout = Layout::from_snapshot(snapshot)?;
    let target_path = layout.path_of(target)?;
    let parent_path = target_path
        .parent()
        .ok_or_else(|| ValidationError::RootHasNoSiblings(target.clone()))?;

    let count = layout.child_count(&parent_path);
    let index = match position {
        SiblingPosition::Left => target_path.last_index(),
        SiblingPosition::Right => target_path.last_index() + 1,
        SiblingPosition::First => 1,
        SiblingPosition::Last => count + 1,
    };
    // the rightmost sibling must still fit after shifting
    parent_path.append_index(count + 1)?;
    let path = parent_path.append_index(index)?;

    let mut plan = WritePlan::new(OperationKind::InsertSibling);
    plan.extend(layout.open_gap(&parent_path, index)?);
    plan.push(create(&layout, payload, path)?);
    log_plan(&plan);
    Ok(plan)
}

/// Deletes the subtree at `node` (descendants first, the node last), then
/// shifts its former right siblings left, lowest first.
pub(crate) fn plan_remove(snapshot: &TreeSnapshot, node: &NodeId) -> Result<WritePlan> {
    let mut layout = Layout::from_snapshot(snapshot)?;
    let path = layout.path_of(node)?;
    let Some(parent_path) = path.parent() else {
        return Err(ValidationError::RemoveRoot(node.clone()).into());
    };

    let descendants: Vec<WriteOp> = layout
        .subtree(&path)
        .into_iter()
        .filter(|(p, _)| p != &path)
        .map(|(path, id)| WriteOp::Delete { id, path })
        .collect();

    let mut plan = WritePlan::new(OperationKind::Remove);
    plan.push(WriteStep { writes: descendants });
    plan.push(WriteStep::single(WriteOp::Delete { id: node.clone(), path: path.clone() }));
    layout.forget_subtree(&path);
    plan.extend(layout.close_gap(&parent_path, path.last_index())?);
    log_plan(&plan);
    Ok(plan)
}

/// Moves the subtree at `node` next to or under `target`:
/// reserve the destination slot, rewrite the subtree into it, then close the
/// hole at the origin.
pub(crate) fn plan_move(
    snapshot: &TreeSnapshot,
    node: &NodeId,
    target: &NodeId,
    position: MovePosition,
) -> Result<WritePlan> {
    let mut layout = Layout::from_snapshot(snapshot)?;
    let node_path = layout.path_of(node)?;
    let target_path = layout.path_of(target)?;

    if node == target {
        return Err(ValidationError::MoveOntoSelf(node.clone()).into());
    }
    if target_path.is_descendant_of(&node_path) {
        return Err(ValidationError::MoveIntoDescendant {
            node: node.clone(),
            target: target.clone(),
        }
        .into());
    }

    let (dest_parent, dest_index) = match position {
        MovePosition::Child => {
            let index = layout.child_count(&target_path) + 1;
            (target_path.clone(), index)
        }
        MovePosition::Left | MovePosition::Right => {
            let parent = target_path
                .parent()
                .ok_or_else(|| ValidationError::RootHasNoSiblings(target.clone()))?;
            let index = match position {
                MovePosition::Left => target_path.last_index(),
                _ => target_path.last_index() + 1,
            };
            (parent, index)
        }
    };
    let dest_parent_id = layout
        .by_path
        .get(&dest_parent)
        .cloned()
        .ok_or_else(|| TreeError::InconsistentTree(format!("no node at {dest_parent}")))?;
    // node's root-ness is ruled out above: every other node descends from the root
    let origin_parent = node_path
        .parent()
        .ok_or_else(|| ValidationError::MoveIntoDescendant { node: node.clone(), target: target.clone() })?;

    let mut plan = WritePlan::new(OperationKind::Move);
    if origin_parent == dest_parent && is_same_slot(&node_path, position, dest_index, &layout) {
        debug!("Move of {} lands on its current slot; nothing to write.", node);
        return Ok(plan);
    }

    // every index under the destination parent must still fit after widening
    dest_parent.append_index(layout.child_count(&dest_parent) + 1)?;

    // reserve
    plan.extend(layout.open_gap(&dest_parent, dest_index)?);

    // rewrite; earlier shifts may have moved the node or its destination parent
    let current = layout.path_of(node)?;
    let dest_parent = layout.path_of(&dest_parent_id)?;
    let destination = dest_parent.append_index(dest_index)?;
    let vacated_parent = current
        .parent()
        .ok_or_else(|| TreeError::InconsistentTree(format!("moved node {node} lost its parent")))?;
    let vacated_index = current.last_index();
    plan.push(layout.relocate(&current, &destination)?);

    // close
    plan.extend(layout.close_gap(&vacated_parent, vacated_index)?);

    log_plan(&plan);
    Ok(plan)
}

/// Whether placing `node_path` at `dest_index` under its own parent leaves it
/// where it already is.
fn is_same_slot(node_path: &NodePath, position: MovePosition, dest_index: u32, layout: &Layout) -> bool {
    let index = node_path.last_index();
    match position {
        MovePosition::Child => {
            // appending under the current parent is a no-op only for the last child
            node_path
                .parent()
                .is_some_and(|parent| layout.child_count(&parent) == index)
        }
        MovePosition::Left | MovePosition::Right => dest_index == index || dest_index == index + 1,
    }
}
