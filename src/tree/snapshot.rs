use std::collections::HashMap;

use log::trace;

use crate::common::NodeId;
use crate::node::Node;
use crate::path::NodePath;
use crate::store::StoreChange;

use super::types::{InvariantViolation, SiblingSide};

/// An owned, path-sorted copy of the tree.
///
/// Because fixed-width paths sort in pre-order, every subtree is a contiguous
/// run of `nodes` starting at its root.
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    nodes: Vec<Node>,
}

impl TreeSnapshot {
    pub fn new(mut nodes: Vec<Node>) -> Self {
        nodes.sort_by(|a, b| a.path().cmp(b.path()).then_with(|| a.id.cmp(&b.id)));
        TreeSnapshot { nodes }
    }

    /// Pre-order listing.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first().filter(|n| n.is_root())
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn get_by_path(&self, path: &NodePath) -> Option<&Node> {
        self.position(path).map(|i| &self.nodes[i])
    }

    fn position(&self, path: &NodePath) -> Option<usize> {
        self.nodes.binary_search_by(|n| n.path().cmp(path)).ok()
    }

    /// Index of the first node sorting after `path`'s whole subtree.
    fn subtree_end(&self, path: &NodePath) -> usize {
        let start = self.nodes.partition_point(|n| n.path() <= path);
        start
            + self.nodes[start..]
                .iter()
                .take_while(|n| n.path().is_descendant_of(path))
                .count()
    }

    pub fn descendants(&self, node: &Node) -> &[Node] {
        let start = self.nodes.partition_point(|n| n.path() <= node.path());
        &self.nodes[start..self.subtree_end(node.path())]
    }

    pub fn children(&self, node: &Node) -> Vec<&Node> {
        let child_depth = node.path().depth() + 1;
        self.descendants(node)
            .iter()
            .filter(|n| n.path().depth() == child_depth)
            .collect()
    }

    pub fn parent(&self, node: &Node) -> Option<&Node> {
        node.path().parent().and_then(|p| self.get_by_path(&p))
    }

    /// Nodes sharing `node`'s parent. Without a side filter the node itself is
    /// included; with one, `include_self` keeps it as well.
    pub fn siblings(&self, node: &Node, side: Option<SiblingSide>, include_self: bool) -> Vec<&Node> {
        let index = node.index();
        self.nodes
            .iter()
            .filter(|n| n.path().is_sibling_of(node.path()))
            .filter(|n| match side {
                None => true,
                Some(_) if n.index() == index => include_self,
                Some(SiblingSide::Left) => n.index() < index,
                Some(SiblingSide::Right) => n.index() > index,
            })
            .collect()
    }

    /// Patches the snapshot with one observed store change.
    pub fn apply(&mut self, change: &StoreChange) {
        match change {
            StoreChange::Created(node) | StoreChange::Updated(node) => {
                self.nodes.retain(|n| n.id != node.id);
                let at = self.nodes.partition_point(|n| n.path() <= node.path());
                self.nodes.insert(at, node.clone());
                trace!("Snapshot: placed {} at {}.", node.id, node.path());
            }
            StoreChange::Deleted(id) => {
                self.nodes.retain(|n| &n.id != id);
                trace!("Snapshot: dropped {}.", id);
            }
        }
    }

    /// Lists every violated data-model invariant.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        let roots: Vec<NodeId> = self.nodes.iter().filter(|n| n.is_root()).map(|n| n.id.clone()).collect();
        match roots.len() {
            0 if !self.nodes.is_empty() => violations.push(InvariantViolation::NoRoot),
            0 | 1 => {}
            _ => violations.push(InvariantViolation::MultipleRoots { ids: roots }),
        }

        let mut by_path: HashMap<&NodePath, Vec<NodeId>> = HashMap::new();
        for node in &self.nodes {
            by_path.entry(node.path()).or_default().push(node.id.clone());
            if node.depth() != node.path().depth() {
                violations.push(InvariantViolation::DepthMismatch {
                    id: node.id.clone(),
                    path: node.path().clone(),
                    depth: node.depth(),
                });
            }
            if let Some(parent) = node.path().parent() {
                if self.get_by_path(&parent).is_none() {
                    violations.push(InvariantViolation::OrphanNode {
                        id: node.id.clone(),
                        path: node.path().clone(),
                    });
                }
            }
        }
        let mut duplicates: Vec<(&NodePath, Vec<NodeId>)> =
            by_path.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
        duplicates.sort_by(|a, b| a.0.cmp(b.0));
        for (path, ids) in duplicates {
            violations.push(InvariantViolation::DuplicatePath { path: path.clone(), ids });
        }

        // contiguous 1..N per parent
        let mut children_of: HashMap<Option<NodePath>, Vec<u32>> = HashMap::new();
        for node in &self.nodes {
            children_of.entry(node.path().parent()).or_default().push(node.index());
        }
        let mut groups: Vec<(Option<NodePath>, Vec<u32>)> = children_of.into_iter().collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        for (parent, mut indices) in groups {
            let Some(parent) = parent else { continue };
            indices.sort_unstable();
            indices.dedup();
            for (expected, found) in (1u32..).zip(indices) {
                if expected != found {
                    violations.push(InvariantViolation::SiblingGap { parent, expected, found });
                    break;
                }
            }
        }

        violations
    }

    /// Indented text listing, two spaces per level below the root.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            let indent = (node.path().depth().saturating_sub(1) * 2) as usize;
            out.push_str(&" ".repeat(indent));
            out.push_str(node.title());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodePayload, NodeRecord};

    fn node(id: &str, path: &str) -> Node {
        Node::new(
            NodeId::from(id),
            NodeRecord::new(NodePayload::titled(id), NodePath::parse(path).unwrap()),
        )
    }

    fn sample() -> TreeSnapshot {
        TreeSnapshot::new(vec![
            node("B", "00010002"),
            node("R", "0001"),
            node("A1", "000100010001"),
            node("A", "00010001"),
            node("B1", "000100020001"),
            node("C", "00010003"),
        ])
    }

    fn ids(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn listing_is_preorder() {
        let snap = sample();
        let order: Vec<&str> = snap.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["R", "A", "A1", "B", "B1", "C"]);
        assert_eq!(snap.root().unwrap().id.as_str(), "R");
    }

    #[test]
    fn relationship_lookups() {
        let snap = sample();
        let root = snap.get(&NodeId::from("R")).unwrap();
        let b = snap.get(&NodeId::from("B")).unwrap();
        assert_eq!(ids(&snap.children(root)), vec!["A", "B", "C"]);
        assert_eq!(snap.descendants(root).len(), 5);
        assert_eq!(snap.descendants(b).len(), 1);
        assert_eq!(snap.parent(b).unwrap().id.as_str(), "R");
        assert!(snap.parent(root).is_none());
    }

    #[test]
    fn sibling_side_filters() {
        let snap = sample();
        let b = snap.get(&NodeId::from("B")).unwrap();
        assert_eq!(ids(&snap.siblings(b, None, false)), vec!["A", "B", "C"]);
        assert_eq!(ids(&snap.siblings(b, Some(SiblingSide::Left), false)), vec!["A"]);
        assert_eq!(ids(&snap.siblings(b, Some(SiblingSide::Right), true)), vec!["B", "C"]);
    }

    #[test]
    fn changes_patch_in_place() {
        let mut snap = sample();
        snap.apply(&StoreChange::Deleted(NodeId::from("A1")));
        snap.apply(&StoreChange::Updated(node("C", "000100010001")));
        snap.apply(&StoreChange::Created(node("D", "00010003")));
        let order: Vec<&str> = snap.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["R", "A", "C", "B", "B1", "D"]);
    }

    #[test]
    fn invariant_check_reports_gaps_and_duplicates() {
        assert!(sample().check_invariants().is_empty());

        let broken = TreeSnapshot::new(vec![
            node("R", "0001"),
            node("A", "00010001"),
            node("B", "00010003"),
            node("C", "00010003"),
            node("X", "000100050001"),
        ]);
        let violations = broken.check_invariants();
        assert!(violations.contains(&InvariantViolation::SiblingGap {
            parent: NodePath::parse("0001").unwrap(),
            expected: 2,
            found: 3,
        }));
        assert!(violations.iter().any(|v| matches!(v, InvariantViolation::DuplicatePath { .. })));
        assert!(violations.iter().any(|v| matches!(v, InvariantViolation::OrphanNode { .. })));
    }

    #[test]
    fn outline_indents_by_depth() {
        let snap = sample();
        assert_eq!(snap.outline(), "R\n  A\n    A1\n  B\n    B1\n  C\n");
    }
}
