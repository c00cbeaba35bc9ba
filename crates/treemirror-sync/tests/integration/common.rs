//! Shared test doubles for the sync engine tests
//!
//! [`FakeTree`] is a scripted `ITreeClient`: a mutable in-memory tree for
//! child listings and root lookup, plus explicitly scripted change pages
//! keyed by token. [`MemoryStore`] is a full `IRecordStore` over a HashMap,
//! with a read counter so memoization can be asserted.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use treemirror_core::domain::newtypes::{ChangeToken, NodeId, NodePath, PageCursor};
use treemirror_core::domain::node::Node;
use treemirror_core::domain::state::MirrorState;
use treemirror_core::normalize::{NodeNormalizer, FOLDER_MIME_TYPE};
use treemirror_core::ports::tree_client::{
    ChangeEvent, ChangePage, ChildPage, ITreeClient, RawNode, StaleTokenError,
};
use treemirror_core::ports::IRecordStore;
use treemirror_sync::SyncCoordinator;

pub const ROOT_NAME: &str = "Google Photos";

// ============================================================================
// RawNode builders
// ============================================================================

pub fn raw_folder(id: &str, name: &str, parent: Option<&str>) -> RawNode {
    RawNode {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        parent_ids: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
        checksum: None,
        size: None,
        owned_by_caller: true,
        trashed: false,
    }
}

pub fn raw_file(id: &str, name: &str, parent: &str) -> RawNode {
    RawNode {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: Some("image/jpeg".to_string()),
        parent_ids: vec![parent.to_string()],
        checksum: Some(format!("md5-{id}")),
        size: Some(1024),
        owned_by_caller: true,
        trashed: false,
    }
}

// ============================================================================
// FakeTree
// ============================================================================

#[derive(Default)]
struct FakeTreeInner {
    /// id -> raw record; BTreeMap so listings are deterministically ordered
    nodes: BTreeMap<String, RawNode>,
    /// token -> scripted change page
    change_pages: HashMap<String, ChangePage>,
    /// tokens the remote reports as expired
    stale_tokens: HashSet<String>,
    /// folders whose child listing fails
    failing_folders: HashSet<String>,
    current_token: String,
    /// children per page; 0 means everything on one page
    page_size: usize,
}

/// Scripted in-memory stand-in for the remote tree
pub struct FakeTree {
    inner: Mutex<FakeTreeInner>,
}

impl FakeTree {
    pub fn new(current_token: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(FakeTreeInner {
                current_token: current_token.to_string(),
                ..Default::default()
            }),
        })
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.inner.lock().unwrap().page_size = page_size;
    }

    pub fn set_current_token(&self, token: &str) {
        self.inner.lock().unwrap().current_token = token.to_string();
    }

    pub fn upsert_raw(&self, raw: RawNode) {
        self.inner.lock().unwrap().nodes.insert(raw.id.clone(), raw);
    }

    pub fn add_folder(&self, id: &str, name: &str, parent: Option<&str>) {
        self.upsert_raw(raw_folder(id, name, parent));
    }

    pub fn add_file(&self, id: &str, name: &str, parent: &str) {
        self.upsert_raw(raw_file(id, name, parent));
    }

    pub fn remove(&self, id: &str) {
        self.inner.lock().unwrap().nodes.remove(id);
    }

    pub fn rename(&self, id: &str, new_name: &str) {
        if let Some(node) = self.inner.lock().unwrap().nodes.get_mut(id) {
            node.name = new_name.to_string();
        }
    }

    pub fn move_node(&self, id: &str, new_parent: &str) {
        if let Some(node) = self.inner.lock().unwrap().nodes.get_mut(id) {
            node.parent_ids = vec![new_parent.to_string()];
        }
    }

    pub fn fail_children_of(&self, id: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_folders
            .insert(id.to_string());
    }

    pub fn mark_stale(&self, token: &str) {
        self.inner
            .lock()
            .unwrap()
            .stale_tokens
            .insert(token.to_string());
    }

    pub fn script_change_page(&self, token: &str, page: ChangePage) {
        self.inner
            .lock()
            .unwrap()
            .change_pages
            .insert(token.to_string(), page);
    }

    /// Scripts a terminal page with the given events and new start token
    pub fn script_final_page(&self, token: &str, changes: Vec<ChangeEvent>, new_start: &str) {
        self.script_change_page(
            token,
            ChangePage {
                changes,
                next_cursor: None,
                new_start_token: Some(ChangeToken::new(new_start).unwrap()),
            },
        );
    }

    /// Scripts a mid-feed page chaining to `next`
    pub fn script_chained_page(&self, token: &str, changes: Vec<ChangeEvent>, next: &str) {
        self.script_change_page(
            token,
            ChangePage {
                changes,
                next_cursor: Some(ChangeToken::new(next).unwrap()),
                new_start_token: None,
            },
        );
    }

    /// Builds an upsert event carrying the node's current remote state
    pub fn change_for(&self, id: &str) -> ChangeEvent {
        let node = self
            .inner
            .lock()
            .unwrap()
            .nodes
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("no such remote node: {id}"));
        ChangeEvent {
            node_id: id.to_string(),
            removed: false,
            node: Some(node),
        }
    }

    pub fn removal_for(id: &str) -> ChangeEvent {
        ChangeEvent {
            node_id: id.to_string(),
            removed: true,
            node: None,
        }
    }
}

#[async_trait::async_trait]
impl ITreeClient for FakeTree {
    async fn list_children(
        &self,
        parent_id: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> anyhow::Result<ChildPage> {
        let inner = self.inner.lock().unwrap();

        if inner.failing_folders.contains(parent_id.as_str()) {
            anyhow::bail!("injected listing failure for {parent_id}");
        }

        let children: Vec<RawNode> = inner
            .nodes
            .values()
            .filter(|n| {
                n.parent_ids.first().map(String::as_str) == Some(parent_id.as_str()) && !n.trashed
            })
            .cloned()
            .collect();

        let offset: usize = cursor.map(|c| c.as_str().parse().unwrap()).unwrap_or(0);
        let page_size = if inner.page_size == 0 {
            children.len().max(1)
        } else {
            inner.page_size
        };
        let end = (offset + page_size).min(children.len());

        let next_cursor = if end < children.len() {
            Some(PageCursor::new(end.to_string()).unwrap())
        } else {
            None
        };

        Ok(ChildPage {
            nodes: children[offset..end].to_vec(),
            next_cursor,
        })
    }

    async fn list_changes(&self, cursor: &ChangeToken) -> anyhow::Result<ChangePage> {
        let inner = self.inner.lock().unwrap();

        if inner.stale_tokens.contains(cursor.as_str()) {
            return Err(anyhow::Error::new(StaleTokenError));
        }

        inner
            .change_pages
            .get(cursor.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no change page scripted for token {cursor}"))
    }

    async fn current_token(&self) -> anyhow::Result<ChangeToken> {
        let token = self.inner.lock().unwrap().current_token.clone();
        Ok(ChangeToken::new(token)?)
    }

    async fn root_by_name(&self, name: &str) -> anyhow::Result<RawNode> {
        let inner = self.inner.lock().unwrap();
        let matches: Vec<RawNode> = inner
            .nodes
            .values()
            .filter(|n| {
                n.name == name
                    && n.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
                    && !n.trashed
            })
            .cloned()
            .collect();

        match matches.len() {
            0 => anyhow::bail!("Root folder '{name}' not found"),
            1 => Ok(matches.into_iter().next().unwrap()),
            n => anyhow::bail!("Root folder '{name}' is ambiguous: {n} matches"),
        }
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
struct MemoryStoreInner {
    nodes: BTreeMap<String, Node>,
    state: Option<MirrorState>,
}

/// In-memory `IRecordStore` with a lookup counter
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
    lookups: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All nodes sorted by id, for whole-mirror comparisons
    pub fn dump(&self) -> Vec<Node> {
        self.inner.lock().unwrap().nodes.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Node> {
        self.inner.lock().unwrap().nodes.get(id).cloned()
    }

    /// Number of `find_by_id` calls observed
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IRecordStore for MemoryStore {
    async fn upsert(&self, node: &Node) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .insert(node.id().as_str().to_string(), node.clone());
        Ok(())
    }

    async fn upsert_batch(&self, nodes: &[Node]) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for node in nodes {
            inner
                .nodes
                .insert(node.id().as_str().to_string(), node.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &NodeId) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .nodes
            .remove(id.as_str())
            .is_some())
    }

    async fn find_by_id(&self, id: &NodeId) -> anyhow::Result<Option<Node>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.lock().unwrap().nodes.get(id.as_str()).cloned())
    }

    async fn find_unresolved(&self) -> anyhow::Result<Vec<Node>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .nodes
            .values()
            .filter(|n| !n.is_resolved())
            .cloned()
            .collect())
    }

    async fn set_path(&self, id: &NodeId, path: &NodePath) -> anyhow::Result<()> {
        if let Some(node) = self.inner.lock().unwrap().nodes.get_mut(id.as_str()) {
            node.set_path(path.clone());
        }
        Ok(())
    }

    async fn clear_paths_beneath(&self, id: &NodeId) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut cleared = 0u64;
        let mut frontier: HashSet<String> = HashSet::new();
        frontier.insert(id.as_str().to_string());

        loop {
            let next: Vec<String> = inner
                .nodes
                .values()
                .filter(|n| {
                    n.first_parent()
                        .map(|p| frontier.contains(p.as_str()))
                        .unwrap_or(false)
                })
                .map(|n| n.id().as_str().to_string())
                .collect();

            if next.is_empty() {
                break;
            }

            let mut progressed = false;
            for child_id in &next {
                if frontier.contains(child_id) {
                    continue;
                }
                progressed = true;
                if let Some(node) = inner.nodes.get_mut(child_id) {
                    if node.is_resolved() {
                        node.clear_path();
                        cleared += 1;
                    }
                }
            }
            frontier.extend(next);
            if !progressed {
                break;
            }
        }

        Ok(cleared)
    }

    async fn count_nodes(&self) -> anyhow::Result<u64> {
        Ok(self.inner.lock().unwrap().nodes.len() as u64)
    }

    async fn drop_all(&self) -> anyhow::Result<()> {
        self.inner.lock().unwrap().nodes.clear();
        Ok(())
    }

    async fn load_state(&self) -> anyhow::Result<MirrorState> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .state
            .clone()
            .unwrap_or_else(MirrorState::initial))
    }

    async fn save_state(&self, state: &MirrorState) -> anyhow::Result<()> {
        self.inner.lock().unwrap().state = Some(state.clone());
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Seeds a small worked tree:
/// `Google Photos (root-1) -> { Albums (d1) -> { 2019 (d2) -> a.jpg (f2) }, b.jpg (f1) }`
pub fn seed_basic_tree(tree: &FakeTree) {
    tree.add_folder("root-1", ROOT_NAME, None);
    tree.add_folder("d1", "Albums", Some("root-1"));
    tree.add_folder("d2", "2019", Some("d1"));
    tree.add_file("f1", "b.jpg", "root-1");
    tree.add_file("f2", "a.jpg", "d2");
}

/// A coordinator over the fakes with default policy and small fan-out
pub fn coordinator(tree: &Arc<FakeTree>, store: &Arc<MemoryStore>) -> SyncCoordinator {
    SyncCoordinator::new(
        tree.clone(),
        store.clone(),
        NodeNormalizer::new(),
        ROOT_NAME,
        2,
    )
}

/// Asserts the path invariant over the whole store:
/// every resolved node's path equals its parent's path plus the parent's name
pub async fn assert_path_invariant(store: &MemoryStore) {
    for node in store.dump() {
        let Some(path) = node.path() else { continue };
        let Some(parent_id) = node.first_parent() else {
            assert!(path.is_root(), "parentless node {} must be root", node.id());
            continue;
        };
        let parent = store
            .get(parent_id.as_str())
            .unwrap_or_else(|| panic!("resolved node {} has unmirrored parent", node.id()));
        let parent_path = parent
            .path()
            .unwrap_or_else(|| panic!("resolved node {} has unresolved parent", node.id()));
        assert_eq!(
            path,
            &parent_path.child(parent.name()),
            "path invariant violated for {}",
            node.id()
        );
    }
}
