// src/lib.rs

//! Ordered organisational tree kept in a remote key-value store as
//! materialized paths.
//!
//! Each node stores a path made of fixed-width sibling indices, so sorting by
//! path yields pre-order traversal and prefix tests yield ancestry. The store
//! offers no multi-record transactions, so every structural change is planned
//! up front as an ordered list of single-record writes that never lets two
//! live nodes share a path, and executed step by step.
//!
//! ```no_run
//! # async fn demo() -> orgtree::error::Result<()> {
//! use std::sync::Arc;
//! use orgtree::{EngineConfig, InMemoryStore, NodePayload, OrgTree, SiblingPosition};
//!
//! let tree = OrgTree::new(Arc::new(InMemoryStore::new()), EngineConfig::default())?;
//! let root = tree.insert_root(NodePayload::titled("HQ")).await?;
//! let east = tree.insert_child(&root, NodePayload::titled("East")).await?;
//! tree.insert_sibling(&east, SiblingPosition::Left, NodePayload::titled("West")).await?;
//! print!("{}", tree.outline().await?);
//! # Ok(())
//! # }
//! ```

// Declare all modules
pub mod common;
pub mod error;
pub mod path;
pub mod node;
pub mod store;
pub mod platform;
pub mod directory;
pub mod tree;

pub use common::{EngineConfig, NodeId};
pub use error::{PartialFailure, StoreError, TreeError, ValidationError};
pub use node::{Node, NodePayload, NodeRecord};
pub use path::NodePath;
pub use store::{InMemoryStore, TreeStore};
pub use tree::{MovePosition, OrgTree, SiblingPosition, SiblingSide};
