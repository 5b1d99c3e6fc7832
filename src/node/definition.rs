// orgtree/src/node/definition.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::NodeId;
use crate::path::NodePath;

/// Payload fields carried by every node. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl NodePayload {
    pub fn titled(title: impl Into<String>) -> Self {
        NodePayload {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// The record persisted per node. The id is assigned by the store and is not
/// part of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    #[serde(flatten)]
    pub payload: NodePayload,
    pub path: NodePath,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl NodeRecord {
    /// A fresh record at `path`; depth is derived from the path.
    pub fn new(payload: NodePayload, path: NodePath) -> Self {
        NodeRecord {
            payload,
            depth: path.depth(),
            path,
            modified_by: None,
            modified_at: None,
        }
    }

    pub fn stamped(mut self, actor: Option<String>, at: DateTime<Utc>) -> Self {
        self.modified_by = actor;
        self.modified_at = Some(at);
        self
    }

    /// Applies a partial update in place.
    pub fn apply(&mut self, patch: &NodePatch) {
        if let Some(path) = &patch.path {
            self.path = path.clone();
        }
        if let Some(depth) = patch.depth {
            self.depth = depth;
        }
        if let Some(payload) = &patch.payload {
            self.payload = payload.clone();
        }
        if patch.modified_by.is_some() {
            self.modified_by = patch.modified_by.clone();
        }
        if patch.modified_at.is_some() {
            self.modified_at = patch.modified_at;
        }
    }
}

/// A partial update. `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<NodePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<NodePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl NodePatch {
    /// Rewrites path and depth together.
    pub fn reposition(path: NodePath) -> Self {
        NodePatch {
            depth: Some(path.depth()),
            path: Some(path),
            ..Default::default()
        }
    }

    pub fn payload(payload: NodePayload) -> Self {
        NodePatch {
            payload: Some(payload),
            ..Default::default()
        }
    }

    pub fn stamped(mut self, actor: Option<String>, at: DateTime<Utc>) -> Self {
        self.modified_by = actor;
        self.modified_at = Some(at);
        self
    }
}

/// A stored node: its record plus the store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub record: NodeRecord,
}

impl Node {
    pub fn new(id: NodeId, record: NodeRecord) -> Self {
        Node { id, record }
    }

    pub fn path(&self) -> &NodePath {
        &self.record.path
    }

    pub fn depth(&self) -> u32 {
        self.record.depth
    }

    pub fn payload(&self) -> &NodePayload {
        &self.record.payload
    }

    pub fn title(&self) -> &str {
        &self.record.payload.title
    }

    /// 1-based position among siblings.
    pub fn index(&self) -> u32 {
        self.record.path.last_index()
    }

    pub fn is_root(&self) -> bool {
        self.record.path.is_root()
    }
}
