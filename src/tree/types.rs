use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::NodeId;
use crate::node::{Node, NodePayload, NodeRecord};
use crate::path::NodePath;

/// Which side of a node to keep when listing its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SiblingSide {
    Left,
    Right,
}

/// Where `insert_sibling` places the new node relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SiblingPosition {
    Left,
    Right,
    First,
    Last,
}

/// Where `move_node` places the moved subtree relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MovePosition {
    /// New rightmost child of the target.
    Child,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    InsertRoot,
    InsertChild,
    InsertSibling,
    Remove,
    Move,
    UpdatePayload,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::InsertRoot => "insert-root",
            OperationKind::InsertChild => "insert-child",
            OperationKind::InsertSibling => "insert-sibling",
            OperationKind::Remove => "remove",
            OperationKind::Move => "move",
            OperationKind::UpdatePayload => "update-payload",
        };
        f.write_str(name)
    }
}

/// One record write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum WriteOp {
    Create { record: NodeRecord },
    /// Rewrites path and depth of one record.
    Reposition { id: NodeId, from: NodePath, to: NodePath },
    Edit { id: NodeId, path: NodePath, payload: NodePayload },
    Delete { id: NodeId, path: NodePath },
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Create { record } => write!(f, "create {}", record.path),
            WriteOp::Reposition { id, from, to } => write!(f, "reposition {id} {from} -> {to}"),
            WriteOp::Edit { id, path, .. } => write!(f, "edit {id}@{path}"),
            WriteOp::Delete { id, path } => write!(f, "delete {id}@{path}"),
        }
    }
}

/// Writes with no dependency on each other. Steps of a plan run in order; the
/// writes inside one step may be in flight together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteStep {
    pub writes: Vec<WriteOp>,
}

impl WriteStep {
    pub fn single(write: WriteOp) -> Self {
        WriteStep { writes: vec![write] }
    }
}

/// The full ordered write list of one compound operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan {
    pub operation: OperationKind,
    pub steps: Vec<WriteStep>,
}

impl WritePlan {
    pub fn new(operation: OperationKind) -> Self {
        WritePlan { operation, steps: Vec::new() }
    }

    pub fn push(&mut self, step: WriteStep) {
        if !step.writes.is_empty() {
            self.steps.push(step);
        }
    }

    pub fn extend(&mut self, steps: impl IntoIterator<Item = WriteStep>) {
        for step in steps {
            self.push(step);
        }
    }

    pub fn total_writes(&self) -> usize {
        self.steps.iter().map(|s| s.writes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every write in issue order.
    pub fn writes(&self) -> impl Iterator<Item = &WriteOp> {
        self.steps.iter().flat_map(|s| s.writes.iter())
    }
}

/// Outcome of a fully acknowledged compound operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationReport {
    pub operation: OperationKind,
    pub writes_applied: usize,
    /// The node created by the operation, if it created one.
    pub created: Option<Node>,
}

/// A broken data-model invariant found in a stored tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InvariantViolation {
    NoRoot,
    MultipleRoots { ids: Vec<NodeId> },
    DuplicatePath { path: NodePath, ids: Vec<NodeId> },
    DepthMismatch { id: NodeId, path: NodePath, depth: u32 },
    OrphanNode { id: NodeId, path: NodePath },
    SiblingGap { parent: NodePath, expected: u32, found: u32 },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::NoRoot => write!(f, "no root node"),
            InvariantViolation::MultipleRoots { ids } => write!(f, "{} root nodes", ids.len()),
            InvariantViolation::DuplicatePath { path, ids } => {
                write!(f, "path {path} held by {} nodes", ids.len())
            }
            InvariantViolation::DepthMismatch { id, path, depth } => {
                write!(f, "node {id} at {path} records depth {depth}")
            }
            InvariantViolation::OrphanNode { id, path } => write!(f, "node {id} at {path} has no parent"),
            InvariantViolation::SiblingGap { parent, expected, found } => {
                write!(f, "children of {parent}: expected index {expected}, found {found}")
            }
        }
    }
}
