// orgtree/src/path.rs

//! Materialized-path codec.
//!
//! A path is a concatenation of fixed-width, zero-padded, 1-based sibling
//! indices, one per depth level. Because every segment has the same width,
//! plain string order over paths is pre-order depth-first order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{MAX_SIBLING_INDEX, SEGMENT_WIDTH};
use crate::error::ValidationError;

/// Zero-pads `index` to a single segment.
pub fn encode_index(index: u32) -> Result<String, ValidationError> {
    if index < 1 || index > MAX_SIBLING_INDEX {
        return Err(ValidationError::IndexOutOfRange(index as i64));
    }
    Ok(format!("{:0width$}", index, width = SEGMENT_WIDTH))
}

/// Parses one segment back into its sibling index.
pub fn decode_index(segment: &str) -> Result<u32, ValidationError> {
    if segment.len() != SEGMENT_WIDTH || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::MalformedSegment(segment.to_string()));
    }
    segment
        .parse::<u32>()
        .map_err(|_| ValidationError::MalformedSegment(segment.to_string()))
}

pub fn depth_of(path: &str) -> u32 {
    (path.len() / SEGMENT_WIDTH) as u32
}

/// `None` for a root (single-segment) path.
pub fn parent_path(path: &str) -> Option<&str> {
    if path.len() <= SEGMENT_WIDTH {
        None
    } else {
        Some(&path[..path.len() - SEGMENT_WIDTH])
    }
}

pub fn is_descendant(candidate: &str, ancestor: &str) -> bool {
    candidate != ancestor && candidate.starts_with(ancestor)
}

/// A validated materialized path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// Accepts only non-empty strings made of whole segments, each decoding
    /// into `1..=9999`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() || raw.len() % SEGMENT_WIDTH != 0 || !raw.is_ascii() {
            return Err(ValidationError::MalformedPath {
                path: raw.to_string(),
                reason: format!("length must be a positive multiple of {SEGMENT_WIDTH}"),
            });
        }
        for chunk in raw.as_bytes().chunks(SEGMENT_WIDTH) {
            // ascii was checked above, so every chunk is valid utf-8
            let segment = std::str::from_utf8(chunk).map_err(|_| ValidationError::MalformedSegment(raw.to_string()))?;
            let index = decode_index(segment)?;
            if index < 1 {
                return Err(ValidationError::MalformedPath {
                    path: raw.to_string(),
                    reason: "sibling indices start at 1".to_string(),
                });
            }
        }
        Ok(NodePath(raw.to_string()))
    }

    /// The path of the single root node.
    pub fn root() -> Self {
        NodePath("0".repeat(SEGMENT_WIDTH - 1) + "1")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn depth(&self) -> u32 {
        depth_of(&self.0)
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == SEGMENT_WIDTH
    }

    pub fn parent(&self) -> Option<NodePath> {
        parent_path(&self.0).map(|p| NodePath(p.to_string()))
    }

    pub fn last_segment(&self) -> &str {
        &self.0[self.0.len() - SEGMENT_WIDTH..]
    }

    /// 1-based position among siblings.
    pub fn last_index(&self) -> u32 {
        // segments were validated on construction
        decode_index(self.last_segment()).unwrap_or(0)
    }

    pub fn is_descendant_of(&self, ancestor: &NodePath) -> bool {
        is_descendant(&self.0, &ancestor.0)
    }

    /// Whether `other` shares this path's parent (root paths are siblings of
    /// nothing but themselves).
    pub fn is_sibling_of(&self, other: &NodePath) -> bool {
        parent_path(&self.0) == parent_path(&other.0) && self.depth() == other.depth()
    }

    pub fn append_index(&self, index: u32) -> Result<NodePath, ValidationError> {
        Ok(NodePath(format!("{}{}", self.0, encode_index(index)?)))
    }

    pub fn with_last_index(&self, index: u32) -> Result<NodePath, ValidationError> {
        let prefix = &self.0[..self.0.len() - SEGMENT_WIDTH];
        Ok(NodePath(format!("{}{}", prefix, encode_index(index)?)))
    }

    pub fn shift_last_index(&self, delta: i64) -> Result<NodePath, ValidationError> {
        let shifted = self.last_index() as i64 + delta;
        if shifted < 1 || shifted > MAX_SIBLING_INDEX as i64 {
            return Err(ValidationError::IndexOutOfRange(shifted));
        }
        self.with_last_index(shifted as u32)
    }

    /// Replaces the `old_prefix` this path starts with by `new_prefix`,
    /// keeping the relative suffix. Returns `None` if `old_prefix` is not a
    /// prefix of this path.
    pub fn rebase(&self, old_prefix: &NodePath, new_prefix: &NodePath) -> Option<NodePath> {
        self.0
            .strip_prefix(old_prefix.as_str())
            .map(|suffix| NodePath(format!("{}{}", new_prefix.0, suffix)))
    }

    pub fn segments(&self) -> impl Iterator<Item = u32> + '_ {
        self.0
            .as_bytes()
            .chunks(SEGMENT_WIDTH)
            .filter_map(|chunk| std::str::from_utf8(chunk).ok())
            .filter_map(|segment| decode_index(segment).ok())
    }
}

impl TryFrom<String> for NodePath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        NodePath::parse(&value)
    }
}

impl From<NodePath> for String {
    fn from(value: NodePath) -> Self {
        value.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({})", self.0)
    }
}
