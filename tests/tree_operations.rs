mod common;

use async_recursion::async_recursion;
use orgtree::directory::StaticDirectory;
use orgtree::{
    EngineConfig, InMemoryStore, Node, NodePayload, OrgTree, SiblingPosition, SiblingSide, TreeError,
    ValidationError,
};

use common::{fixture, fixture_with, layout, node, payload, sample_org};

#[async_recursion]
async fn dfs(tree: &OrgTree<InMemoryStore>, from: &Node, out: &mut Vec<String>) {
    out.push(from.path().to_string());
    for child in tree.get_children(from).await.unwrap() {
        dfs(tree, &child, out).await;
    }
}

#[tokio::test]
async fn sibling_insert_then_remove_keeps_order_contiguous() {
    let fx = fixture();
    let t = &fx.tree;
    let r = t.insert_root(payload("R")).await.unwrap();
    assert_eq!(r.path().as_str(), "0001");
    assert_eq!(r.depth(), 1);
    let a = t.insert_child(&r, payload("A")).await.unwrap();
    let b = t.insert_child(&r, payload("B")).await.unwrap();
    assert_eq!(a.path().as_str(), "00010001");
    assert_eq!(b.path().as_str(), "00010002");

    let c = t.insert_sibling(&a, SiblingPosition::Right, payload("C")).await.unwrap();
    assert_eq!(c.path().as_str(), "00010002");
    assert_eq!(layout(t).await, vec!["R@0001", "A@00010001", "C@00010002", "B@00010003"]);

    t.remove(&a).await.unwrap();
    assert_eq!(layout(t).await, vec!["R@0001", "C@00010001", "B@00010002"]);

    assert!(fx.store.observed_collisions().await.is_empty());
    assert!(t.check_invariants().await.unwrap().is_empty());
}

#[tokio::test]
async fn repeated_insert_child_yields_contiguous_indices() {
    let fx = fixture();
    let t = &fx.tree;
    let r = t.insert_root(payload("R")).await.unwrap();
    for i in 0..12 {
        t.insert_child(&r, payload(&format!("c{i}"))).await.unwrap();
    }
    let children = t.get_children(&r).await.unwrap();
    let indices: Vec<u32> = children.iter().map(Node::index).collect();
    assert_eq!(indices, (1..=12).collect::<Vec<_>>());
    let titles: Vec<&str> = children.iter().map(Node::title).collect();
    assert_eq!(titles[0], "c0");
    assert_eq!(titles[11], "c11");
}

#[tokio::test]
async fn listing_matches_recursive_traversal() {
    for cache_reads in [true, false] {
        let fx = fixture_with(EngineConfig { cache_reads, ..Default::default() });
        sample_org(&fx).await;
        let t = &fx.tree;
        // mix things up so the listing is not just creation order
        let c = node(t, "C").await;
        t.insert_sibling(&c, SiblingPosition::First, payload("Z")).await.unwrap();

        let listed: Vec<String> = t.get_tree().await.unwrap().iter().map(|n| n.path().to_string()).collect();
        let mut walked = Vec::new();
        dfs(t, &t.get_root().await.unwrap(), &mut walked).await;
        assert_eq!(listed, walked);
    }
}

#[tokio::test]
async fn insert_sibling_left_shifts_target_and_right_siblings() {
    let fx = fixture();
    sample_org(&fx).await;
    let t = &fx.tree;
    let a = node(t, "A").await;
    t.insert_sibling(&a, SiblingPosition::Left, payload("N")).await.unwrap();
    assert_eq!(
        layout(t).await,
        vec![
            "R@0001",
            "N@00010001",
            "A@00010002",
            "A1@000100020001",
            "A2@000100020002",
            "A21@0001000200020001",
            "B@00010003",
            "B1@000100030001",
            "C@00010004",
        ]
    );
    assert!(fx.store.observed_collisions().await.is_empty());
}

#[tokio::test]
async fn insert_sibling_last_appends() {
    let fx = fixture();
    sample_org(&fx).await;
    let t = &fx.tree;
    let a1 = node(t, "A1").await;
    let writes_before = fx.store.write_count().await;
    let n = t.insert_sibling(&a1, SiblingPosition::Last, payload("N")).await.unwrap();
    assert_eq!(n.path().as_str(), "000100010003");
    assert_eq!(fx.store.write_count().await, writes_before + 1);
}

#[tokio::test]
async fn remove_cascades_and_reindexes() {
    let fx = fixture();
    sample_org(&fx).await;
    let t = &fx.tree;
    let a = node(t, "A").await;
    let report = t.remove(&a).await.unwrap();
    // 4 deletes, then B (2 records) and C (1 record) shift left
    assert_eq!(report.writes_applied, 7);
    assert_eq!(
        layout(t).await,
        vec!["R@0001", "B@00010001", "B1@000100010001", "C@00010002"]
    );
    assert!(fx.store.observed_collisions().await.is_empty());
}

#[tokio::test]
async fn removing_root_is_rejected_without_writes() {
    let fx = fixture();
    sample_org(&fx).await;
    let t = &fx.tree;
    let writes_before = fx.store.write_count().await;
    let root = t.get_root().await.unwrap();
    let err = t.remove(&root).await.unwrap_err();
    assert!(matches!(err, TreeError::Validation(ValidationError::RemoveRoot(_))));
    assert_eq!(fx.store.write_count().await, writes_before);
}

#[tokio::test]
async fn second_root_is_rejected() {
    let fx = fixture();
    fx.tree.insert_root(payload("R")).await.unwrap();
    let err = fx.tree.insert_root(payload("R2")).await.unwrap_err();
    assert!(matches!(err, TreeError::Validation(ValidationError::RootExists(_))));
}

#[tokio::test]
async fn read_queries() {
    let fx = fixture();
    sample_org(&fx).await;
    let t = &fx.tree;
    let a = node(t, "A").await;
    let b = node(t, "B").await;
    let a2 = node(t, "A2").await;

    let desc: Vec<String> = t.get_descendants(&a).await.unwrap().iter().map(|n| n.title().to_string()).collect();
    assert_eq!(desc, vec!["A1", "A2", "A21"]);
    let left: Vec<String> = t
        .get_siblings(&b, Some(SiblingSide::Left))
        .await
        .unwrap()
        .iter()
        .map(|n| n.title().to_string())
        .collect();
    assert_eq!(left, vec!["A"]);
    assert_eq!(t.get_siblings(&b, None).await.unwrap().len(), 3);
    let right_with_self: Vec<String> = t
        .get_siblings_with(&b, Some(SiblingSide::Right), true)
        .await
        .unwrap()
        .iter()
        .map(|n| n.title().to_string())
        .collect();
    assert_eq!(right_with_self, vec!["B", "C"]);
    assert_eq!(t.get_parent(&a2).await.unwrap().unwrap().id, a.id);
    assert_eq!(t.get_node_by_id(&a.id).await.unwrap().unwrap().title(), "A");
    assert_eq!(t.get_node_by_path(a2.path()).await.unwrap().unwrap().title(), "A2");
    assert_eq!(t.outline().await.unwrap(), "R\n  A\n    A1\n    A2\n      A21\n  B\n    B1\n  C\n");
}

#[tokio::test]
async fn stale_node_copies_are_resolved_by_id() {
    let fx = fixture();
    sample_org(&fx).await;
    let t = &fx.tree;
    let stale_c = node(t, "C").await;
    let a = node(t, "A").await;
    t.remove(&a).await.unwrap();
    // stale_c still says 00010003; the tree has it at 00010002 now
    let child = t.insert_child(&stale_c, payload("C1")).await.unwrap();
    assert_eq!(child.path().as_str(), "000100020001");
}

#[tokio::test]
async fn payload_update_leaves_position_alone() {
    let fx = fixture();
    sample_org(&fx).await;
    let t = &fx.tree;
    let b = node(t, "B").await;
    let updated = t
        .update_payload(
            &b,
            NodePayload { title: "Bravo".into(), leader_ref: Some("u-2".into()), level: Some("區".into()) },
        )
        .await
        .unwrap();
    assert_eq!(updated.path(), b.path());
    let stored = t.get_node_by_id(&b.id).await.unwrap().unwrap();
    assert_eq!(stored.title(), "Bravo");
    assert_eq!(stored.payload().level.as_deref(), Some("區"));
}

#[tokio::test]
async fn labeled_tree_resolves_leader_names() {
    let fx = fixture();
    let t = &fx.tree;
    let r = t
        .insert_root(NodePayload { title: "R".into(), leader_ref: Some("u-1".into()), level: None })
        .await
        .unwrap();
    t.insert_child(&r, NodePayload { title: "A".into(), leader_ref: Some("u-9".into()), level: None })
        .await
        .unwrap();
    let directory = StaticDirectory::new().with_entry("u-1", "Grace Hopper");
    let labeled = t.labeled_tree(&directory).await.unwrap();
    assert_eq!(labeled[0].1.as_deref(), Some("Grace Hopper"));
    assert_eq!(labeled[1].1, None);
}

#[tokio::test]
async fn concurrent_callers_are_serialized() {
    let fx = fixture();
    let t = &fx.tree;
    let r = t.insert_root(payload("R")).await.unwrap();
    let (x, y, z) = tokio::join!(
        t.insert_child(&r, payload("x")),
        t.insert_child(&r, payload("y")),
        t.insert_child(&r, payload("z")),
    );
    let mut paths = vec![
        x.unwrap().path().to_string(),
        y.unwrap().path().to_string(),
        z.unwrap().path().to_string(),
    ];
    paths.sort();
    assert_eq!(paths, vec!["00010001", "00010002", "00010003"]);
    assert!(fx.store.observed_collisions().await.is_empty());
}

#[tokio::test]
async fn configured_levels_are_exposed() {
    let config = EngineConfig::from_json(r#"{ "levels": ["牧區", "區", "實習區", "小組", "福音站"] }"#).unwrap();
    let fx = fixture_with(config);
    assert_eq!(fx.tree.levels().len(), 5);
    assert_eq!(fx.tree.levels()[3], "小組");
}
