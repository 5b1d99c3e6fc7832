// orgtree/src/node/mod.rs

pub mod definition;

// Re-export key items for easier access from `crate::node::`
pub use definition::{Node, NodePatch, NodePayload, NodeRecord};
