// orgtree/src/store/mod.rs

pub mod tree_store;
pub mod mem_store;

// Re-export key items for easier access from `crate::store::`
pub use tree_store::{DepthFilter, StoreChange, TreeStore};
pub use mem_store::InMemoryStore;
