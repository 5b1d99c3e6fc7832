// orgtree/src/error.rs

use serde::Serialize;
use thiserror::Error;

use crate::common::NodeId;
use crate::path::NodePath;
use crate::tree::types::{OperationKind, WriteOp};

/// Rejections detected before any write is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationError {
    #[error("sibling index {0} is outside 1..=9999")]
    IndexOutOfRange(i64),

    #[error("malformed path segment {0:?}")]
    MalformedSegment(String),

    #[error("malformed path {path:?}: {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("cannot remove the root node {0}")]
    RemoveRoot(NodeId),

    #[error("cannot move node {0} relative to itself")]
    MoveOntoSelf(NodeId),

    #[error("cannot move node {node} into its own descendant {target}")]
    MoveIntoDescendant { node: NodeId, target: NodeId },

    #[error("root node {0} has no siblings")]
    RootHasNoSiblings(NodeId),

    #[error("the tree already has a root ({0})")]
    RootExists(NodeId),
}

/// Failure of a single store call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("store rejected the write: {0}")]
    Rejected(String),

    #[error("record {0} does not exist in the store")]
    NotFound(NodeId),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedWrite {
    pub write: WriteOp,
    pub error: StoreError,
}

/// A compound operation stopped partway through its write sequence. Nothing
/// already applied is rolled back.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{}", summarize(.operation, .completed, .failed, .not_attempted))]
pub struct PartialFailure {
    pub operation: OperationKind,
    pub completed: Vec<WriteOp>,
    pub failed: Vec<FailedWrite>,
    pub not_attempted: Vec<WriteOp>,
}

impl PartialFailure {
    pub fn total_writes(&self) -> usize {
        self.completed.len() + self.failed.len() + self.not_attempted.len()
    }

    /// True when no write was applied, so the stored tree is unchanged.
    pub fn is_clean(&self) -> bool {
        self.completed.is_empty()
    }

    /// Every node the aborted operation left out of place, as `id@path` at
    /// the path the node holds now. Nodes created by the operation show as
    /// `<new>@path`; deleted nodes are not listed.
    pub fn inconsistent_nodes(&self) -> Vec<String> {
        stranded_nodes(&self.completed, &self.failed, &self.not_attempted)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn stranded_nodes(completed: &[WriteOp], failed: &[FailedWrite], not_attempted: &[WriteOp]) -> Vec<String> {
    fn locate(nodes: &mut Vec<(NodeId, NodePath)>, id: &NodeId, path: &NodePath, moved: bool) {
        match nodes.iter_mut().find(|(n, _)| n == id) {
            Some(entry) if moved => entry.1 = path.clone(),
            Some(_) => {}
            None => nodes.push((id.clone(), path.clone())),
        }
    }

    let mut nodes: Vec<(NodeId, NodePath)> = Vec::new();
    let mut created: Vec<&NodePath> = Vec::new();
    for write in completed {
        match write {
            WriteOp::Create { record } => created.push(&record.path),
            WriteOp::Reposition { id, to, .. } => locate(&mut nodes, id, to, true),
            WriteOp::Edit { id, path, .. } => locate(&mut nodes, id, path, false),
            WriteOp::Delete { id, .. } => nodes.retain(|(n, _)| n != id),
        }
    }
    // unapplied writes leave their node where it was before them
    for write in failed.iter().map(|f| &f.write).chain(not_attempted) {
        match write {
            WriteOp::Create { .. } => {}
            WriteOp::Reposition { id, from, .. } => locate(&mut nodes, id, from, false),
            WriteOp::Edit { id, path, .. } | WriteOp::Delete { id, path } => locate(&mut nodes, id, path, false),
        }
    }

    nodes
        .into_iter()
        .map(|(id, path)| format!("{id}@{path}"))
        .chain(created.into_iter().map(|path| format!("<new>@{path}")))
        .collect()
}

fn summarize(
    operation: &OperationKind,
    completed: &[WriteOp],
    failed: &[FailedWrite],
    not_attempted: &[WriteOp],
) -> String {
    let total = completed.len() + failed.len() + not_attempted.len();
    let mut out = format!("{operation} aborted after {} of {total} writes", completed.len());
    if let Some(first) = failed.first() {
        out.push_str(&format!(" ({})", first.error));
    }
    let nodes = stranded_nodes(completed, failed, not_attempted);
    if !nodes.is_empty() {
        out.push_str(&format!("; inconsistent nodes: {}", nodes.join(", ")));
    }
    out
}

/// Error type for every engine operation.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    PartialFailure(Box<PartialFailure>),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("the tree has no root")]
    EmptyTree,

    #[error("stored tree is inconsistent: {0}")]
    InconsistentTree(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PartialFailure> for TreeError {
    fn from(value: PartialFailure) -> Self {
        TreeError::PartialFailure(Box::new(value))
    }
}

impl TreeError {
    pub fn as_partial_failure(&self) -> Option<&PartialFailure> {
        match self {
            TreeError::PartialFailure(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> NodePath {
        NodePath::parse(raw).unwrap()
    }

    fn shift(id: &str, from: &str, to: &str) -> WriteOp {
        WriteOp::Reposition { id: NodeId::from(id), from: p(from), to: p(to) }
    }

    fn unavailable(write: WriteOp) -> FailedWrite {
        FailedWrite { write, error: StoreError::Unavailable("down".to_string()) }
    }

    #[test]
    fn stranded_nodes_are_named_where_they_still_are() {
        let failure = PartialFailure {
            operation: OperationKind::Remove,
            completed: vec![
                WriteOp::Delete { id: NodeId::from("A1"), path: p("000100010001") },
                WriteOp::Delete { id: NodeId::from("A"), path: p("00010001") },
            ],
            failed: vec![unavailable(shift("B", "00010002", "00010001"))],
            not_attempted: vec![shift("B1", "000100020001", "000100010001"), shift("C", "00010003", "00010002")],
        };
        assert_eq!(
            failure.inconsistent_nodes(),
            vec!["B@00010002", "B1@000100020001", "C@00010003"]
        );
        assert_eq!(
            failure.to_string(),
            "remove aborted after 2 of 5 writes (store unavailable: down); \
             inconsistent nodes: B@00010002, B1@000100020001, C@00010003"
        );
    }

    #[test]
    fn applied_shift_wins_over_later_unapplied_one() {
        let failure = PartialFailure {
            operation: OperationKind::Move,
            completed: vec![shift("C", "00010003", "00010004")],
            failed: vec![unavailable(shift("B", "00010002", "00010003"))],
            not_attempted: vec![shift("C", "00010004", "00010001")],
        };
        assert_eq!(failure.inconsistent_nodes(), vec!["C@00010004", "B@00010002"]);
    }
}
