// orgtree/src/directory.rs

//! Boundary to identity and directory services. The engine only ever asks
//! "who is writing" and "what is this leader called"; both answers come from
//! outside.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Supplies the actor recorded on every write for audit purposes.
pub trait ActorProvider: std::fmt::Debug + Send + Sync {
    fn current_actor(&self) -> Option<String>;
}

/// No signed-in actor; writes carry no `modifiedBy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl ActorProvider for Anonymous {
    fn current_actor(&self) -> Option<String> {
        None
    }
}

/// A fixed actor, e.g. a service account.
#[derive(Debug, Clone)]
pub struct FixedActor(pub String);

impl ActorProvider for FixedActor {
    fn current_actor(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Resolves a node's `leaderRef` into a human-readable name.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait DisplayNameResolver: std::fmt::Debug + Send + Sync {
    /// `Ok(None)` when the directory has no entry for `leader_ref`.
    async fn display_name(&self, leader_ref: &str) -> StoreResult<Option<String>>;
}

/// Resolver backed by a static table.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    names: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, leader_ref: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(leader_ref.into(), name.into());
        self
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl DisplayNameResolver for StaticDirectory {
    async fn display_name(&self, leader_ref: &str) -> StoreResult<Option<String>> {
        Ok(self.names.get(leader_ref).cloned())
    }
}
