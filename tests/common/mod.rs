#![allow(dead_code)]

use std::sync::Arc;

use orgtree::{EngineConfig, InMemoryStore, Node, NodePayload, OrgTree};

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub tree: OrgTree<InMemoryStore>,
}

pub fn fixture() -> Fixture {
    fixture_with(EngineConfig::default())
}

pub fn fixture_with(config: EngineConfig) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let tree = OrgTree::new(Arc::clone(&store), config).expect("valid config");
    Fixture { store, tree }
}

pub fn payload(title: &str) -> NodePayload {
    NodePayload::titled(title)
}

/// Current copy of the node titled `title`.
pub async fn node(tree: &OrgTree<InMemoryStore>, title: &str) -> Node {
    tree.get_tree()
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.title() == title)
        .unwrap_or_else(|| panic!("no node titled {title}"))
}

/// `title@path` for every node, in pre-order.
pub async fn layout(tree: &OrgTree<InMemoryStore>) -> Vec<String> {
    tree.get_tree()
        .await
        .unwrap()
        .iter()
        .map(|n| format!("{}@{}", n.title(), n.path()))
        .collect()
}

/// Builds
///
/// ```text
/// R
/// ├── A
/// │   ├── A1
/// │   └── A2
/// │       └── A21
/// ├── B
/// │   └── B1
/// └── C
/// ```
pub async fn sample_org(fx: &Fixture) {
    let t = &fx.tree;
    let r = t.insert_root(payload("R")).await.unwrap();
    let a = t.insert_child(&r, payload("A")).await.unwrap();
    let b = t.insert_child(&r, payload("B")).await.unwrap();
    t.insert_child(&r, payload("C")).await.unwrap();
    t.insert_child(&a, payload("A1")).await.unwrap();
    let a2 = t.insert_child(&a, payload("A2")).await.unwrap();
    t.insert_child(&a2, payload("A21")).await.unwrap();
    t.insert_child(&b, payload("B1")).await.unwrap();
}
