//! Reconciler tests: feed application, idempotence, token advancement,
//! rename/move invalidation

use std::sync::Arc;

use treemirror_core::domain::newtypes::{ChangeToken, NodePath};
use treemirror_core::domain::state::MirrorState;
use treemirror_core::normalize::NodeNormalizer;
use treemirror_core::ports::tree_client::ChangeEvent;
use treemirror_core::ports::IRecordStore;
use treemirror_sync::ChangeReconciler;

use crate::common::{raw_file, FakeTree, MemoryStore};

fn reconciler(tree: &Arc<FakeTree>, store: &Arc<MemoryStore>) -> ChangeReconciler {
    ChangeReconciler::new(tree.clone(), store.clone(), Arc::new(NodeNormalizer::new()))
}

fn token(s: &str) -> ChangeToken {
    ChangeToken::new(s).unwrap()
}

/// Seeds the persisted checkpoint so page-by-page advancement is observable
async fn seed_state(store: &MemoryStore, tok: &str) {
    let mut state = MirrorState::initial();
    state.mark_clean(token(tok), treemirror_core::domain::newtypes::NodeId::new("root-1").unwrap());
    store.save_state(&state).await.unwrap();
}

#[tokio::test]
async fn test_upsert_event_inserts_orphan() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    tree.add_file("f1", "new.jpg", "root-1");
    tree.script_final_page("1000", vec![tree.change_for("f1")], "1001");

    let outcome = reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();

    assert_eq!(outcome.upserted, 1);
    assert_eq!(outcome.new_token.as_str(), "1001");

    let node = store.get("f1").unwrap();
    assert_eq!(node.name(), "new.jpg");
    // Inline resolution is never attempted; the node waits for the resolver
    assert!(!node.is_resolved());
}

#[tokio::test]
async fn test_removal_deletes_and_ghost_removal_is_noop() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    tree.add_file("f1", "doomed.jpg", "root-1");
    tree.script_final_page("1000", vec![tree.change_for("f1")], "1001");
    reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();
    assert!(store.get("f1").is_some());

    // One removal for a mirrored node, one for a node never seen locally
    tree.script_final_page(
        "1001",
        vec![
            FakeTree::removal_for("f1"),
            FakeTree::removal_for("never-seen"),
        ],
        "1002",
    );
    let outcome = reconciler(&tree, &store)
        .apply_changes(&token("1001"))
        .await
        .unwrap();

    assert_eq!(outcome.deleted, 1);
    assert_eq!(outcome.ghost_removals, 1);
    assert!(store.get("f1").is_none());
}

#[tokio::test]
async fn test_trashed_payload_is_a_removal() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    tree.add_file("f1", "kept.jpg", "root-1");
    tree.script_final_page("1000", vec![tree.change_for("f1")], "1001");
    reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();

    let mut trashed = raw_file("f1", "kept.jpg", "root-1");
    trashed.trashed = true;
    tree.script_final_page(
        "1001",
        vec![ChangeEvent {
            node_id: "f1".to_string(),
            removed: false,
            node: Some(trashed),
        }],
        "1002",
    );

    let outcome = reconciler(&tree, &store)
        .apply_changes(&token("1001"))
        .await
        .unwrap();

    assert_eq!(outcome.deleted, 1);
    assert!(store.get("f1").is_none());
}

#[tokio::test]
async fn test_malformed_events_skipped_not_fatal() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    let no_parent = ChangeEvent {
        node_id: "lost".to_string(),
        removed: false,
        node: Some(raw_file("lost", "lost.jpg", "")),
    };
    let empty_id = ChangeEvent {
        node_id: String::new(),
        removed: false,
        node: Some(raw_file("x", "x.jpg", "root-1")),
    };
    let no_payload = ChangeEvent {
        node_id: "hollow".to_string(),
        removed: false,
        node: None,
    };

    tree.script_final_page("1000", vec![no_parent, empty_id, no_payload], "1001");

    let outcome = reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();

    assert_eq!(outcome.skipped, 3);
    assert_eq!(outcome.upserted, 0);
    assert_eq!(outcome.new_token.as_str(), "1001");
    assert_eq!(store.count_nodes().await.unwrap(), 0);
}

#[tokio::test]
async fn test_later_event_for_same_node_wins() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    let first = ChangeEvent {
        node_id: "f1".to_string(),
        removed: false,
        node: Some(raw_file("f1", "old-name.jpg", "root-1")),
    };
    let second = ChangeEvent {
        node_id: "f1".to_string(),
        removed: false,
        node: Some(raw_file("f1", "new-name.jpg", "root-1")),
    };
    tree.script_final_page("1000", vec![first, second], "1001");

    reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();

    assert_eq!(store.get("f1").unwrap().name(), "new-name.jpg");
}

#[tokio::test]
async fn test_reapplying_same_feed_is_idempotent() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    tree.add_file("f1", "a.jpg", "root-1");
    tree.add_file("f2", "b.jpg", "root-1");
    let events = vec![
        tree.change_for("f1"),
        tree.change_for("f2"),
        FakeTree::removal_for("gone"),
    ];
    tree.script_final_page("1000", events.clone(), "1001");
    // Simulate at-least-once delivery: the same events replay from the
    // next token as well
    tree.script_final_page("1001", events, "1002");

    reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();
    let after_first = store.dump();

    reconciler(&tree, &store)
        .apply_changes(&token("1001"))
        .await
        .unwrap();
    let after_second = store.dump();

    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_token_advances_per_applied_page() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    tree.add_file("f1", "a.jpg", "root-1");
    tree.add_file("f2", "b.jpg", "root-1");
    tree.script_chained_page("1000", vec![tree.change_for("f1")], "1005");
    tree.script_chained_page("1005", vec![tree.change_for("f2")], "1010");
    // Token "1010" is deliberately unscripted: the third fetch fails

    let err = reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("1010"));

    // Both applied pages stuck; the checkpoint resumes at the failed page,
    // not at the start
    let state = store.load_state().await.unwrap();
    assert_eq!(state.change_token.unwrap().as_str(), "1010");
    assert!(store.get("f1").is_some());
    assert!(store.get("f2").is_some());
}

#[tokio::test]
async fn test_folder_rename_invalidates_descendant_paths() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    // Mirror with resolved paths, as a rebuild would leave it
    use treemirror_core::domain::newtypes::NodeId;
    use treemirror_core::domain::node::{Node, NodeKind};
    let root = Node::new(
        NodeId::new("root-1").unwrap(),
        "Google Photos",
        NodeKind::Folder,
        vec![],
        Some("application/vnd.google-apps.folder".to_string()),
        None,
        None,
        true,
    )
    .with_path(NodePath::root());
    store.upsert(&root).await.unwrap();

    tree.add_folder("root-1", "Google Photos", None);
    tree.add_folder("d1", "Albums", Some("root-1"));
    tree.add_file("f1", "a.jpg", "d1");

    let albums = Node::new(
        NodeId::new("d1").unwrap(),
        "Albums",
        NodeKind::Folder,
        vec![NodeId::new("root-1").unwrap()],
        Some("application/vnd.google-apps.folder".to_string()),
        None,
        None,
        true,
    )
    .with_path(NodePath::root().child("Google Photos"));
    let pic = Node::new(
        NodeId::new("f1").unwrap(),
        "a.jpg",
        NodeKind::File,
        vec![NodeId::new("d1").unwrap()],
        Some("image/jpeg".to_string()),
        None,
        Some(1024),
        true,
    )
    .with_path(NodePath::root().child("Google Photos").child("Albums"));
    store.upsert(&albums).await.unwrap();
    store.upsert(&pic).await.unwrap();

    // The remote renames the folder; one upsert event arrives
    tree.rename("d1", "Albums2");
    tree.script_final_page("1000", vec![tree.change_for("d1")], "1001");

    reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();

    // The folder keeps its own path (its ancestry did not change) but the
    // descendant's stale path is cleared for the resolver to recompute
    let renamed = store.get("d1").unwrap();
    assert_eq!(renamed.name(), "Albums2");
    assert_eq!(
        renamed.path().unwrap().segments(),
        &["Google Photos".to_string()]
    );
    assert!(!store.get("f1").unwrap().is_resolved());
}

#[tokio::test]
async fn test_file_rename_keeps_own_path() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    tree.add_file("f1", "old.jpg", "root-1");
    tree.script_final_page("1000", vec![tree.change_for("f1")], "1001");
    reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();
    store
        .set_path(
            &treemirror_core::domain::newtypes::NodeId::new("f1").unwrap(),
            &NodePath::root().child("Google Photos"),
        )
        .await
        .unwrap();

    tree.rename("f1", "new.jpg");
    tree.script_final_page("1001", vec![tree.change_for("f1")], "1002");
    reconciler(&tree, &store)
        .apply_changes(&token("1001"))
        .await
        .unwrap();

    let node = store.get("f1").unwrap();
    assert_eq!(node.name(), "new.jpg");
    // A rename changes the node's name, not its ancestry
    assert_eq!(
        node.path().unwrap().segments(),
        &["Google Photos".to_string()]
    );
}

#[tokio::test]
async fn test_move_clears_own_path() {
    let tree = FakeTree::new("1000");
    let store = MemoryStore::new();
    seed_state(&store, "1000").await;

    tree.add_folder("d1", "Albums", Some("root-1"));
    tree.add_file("f1", "a.jpg", "root-1");
    tree.script_final_page(
        "1000",
        vec![tree.change_for("d1"), tree.change_for("f1")],
        "1001",
    );
    reconciler(&tree, &store)
        .apply_changes(&token("1000"))
        .await
        .unwrap();
    store
        .set_path(
            &treemirror_core::domain::newtypes::NodeId::new("f1").unwrap(),
            &NodePath::root().child("Google Photos"),
        )
        .await
        .unwrap();

    // The file moves under Albums; its old path is now wrong
    tree.move_node("f1", "d1");
    tree.script_final_page("1001", vec![tree.change_for("f1")], "1002");
    reconciler(&tree, &store)
        .apply_changes(&token("1001"))
        .await
        .unwrap();

    let node = store.get("f1").unwrap();
    assert_eq!(node.first_parent().unwrap().as_str(), "d1");
    assert!(!node.is_resolved());
}
