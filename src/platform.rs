// orgtree/src/platform.rs

//! Thread-safety bounds that differ per target. On native hosts the
//! coordinator's boxed write futures hold `&S` and may be polled from any
//! runtime worker, so the store must be `Send + Sync`. A wasm host drives
//! everything on one thread and its store bindings are rarely `Send`.

use crate::store::TreeStore;
use std::future::Future;
use std::pin::Pin;

/// A store the engine can share between its read cache and its writers.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformStore: TreeStore + Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: TreeStore + Send + Sync> PlatformStore for T {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformStore: TreeStore {}
#[cfg(target_arch = "wasm32")]
impl<T: TreeStore> PlatformStore for T {}

/// One in-flight store write, as queued by the coordinator.
#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[cfg(target_arch = "wasm32")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
