//! Full-rebuild tree traversal
//!
//! The [`TreeWalker`] materializes every descendant of the mirror root with
//! a fully resolved path, visiting each remote node exactly once. Traversal
//! is iterative over an explicit work frontier - never recursion, so stack
//! depth stays flat regardless of tree depth.
//!
//! ## Fan-out model
//!
//! A pool of worker tasks shares a frontier of `(path prefix, folder)` work
//! items. Each worker drains one folder's child pages to exhaustion
//! (pagination within a folder must stay ordered), batch-persists the
//! normalized children, and pushes discovered sub-folders back onto the
//! frontier. Completion is tracked with an outstanding-work counter that
//! counts items queued or in flight: the walk terminates only when the
//! counter reaches zero, never on queue-empty alone, because an idle queue
//! with a worker mid-fetch may still grow.
//!
//! With `workers = 1` this degrades to a plain sequential DFS-via-stack.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use treemirror_core::domain::newtypes::{NodePath, PageCursor};
use treemirror_core::domain::node::Node;
use treemirror_core::normalize::{NodeNormalizer, Normalized};
use treemirror_core::ports::{IRecordStore, ITreeClient};

/// Counts reported by a completed walk
#[derive(Debug, Clone, Default)]
pub struct WalkSummary {
    /// Nodes persisted (the root itself is persisted by the caller)
    pub nodes_written: u64,
    /// Folders whose child listing was drained
    pub folders_visited: u64,
    /// Records skipped by the normalizer (trashed, untracked, malformed)
    pub skipped: u64,
}

/// One unit of traversal work: a folder and the path its children inherit
/// minus the folder's own name
struct WalkItem {
    prefix: NodePath,
    parent: Node,
}

/// Shared traversal frontier
///
/// `outstanding` counts work items that have been pushed but not yet fully
/// processed; it is incremented on push and decremented only after the
/// item's children are persisted and its sub-folders re-pushed. Workers
/// block on `notify` when the queue is momentarily empty.
struct Frontier {
    queue: Mutex<VecDeque<WalkItem>>,
    outstanding: AtomicUsize,
    notify: Notify,
    aborted: AtomicBool,
}

impl Frontier {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            outstanding: AtomicUsize::new(0),
            notify: Notify::new(),
            aborted: AtomicBool::new(false),
        }
    }

    async fn push(&self, item: WalkItem) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().await.push_back(item);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Option<WalkItem> {
        self.queue.lock().await.pop_front()
    }

    /// Marks one item fully processed; wakes a sleeper when the walk drains
    fn complete_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_one();
        }
    }

    fn is_drained(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) == 0
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct WalkStats {
    nodes_written: AtomicU64,
    folders_visited: AtomicU64,
    skipped: AtomicU64,
}

/// Full-rebuild traversal over the remote tree
pub struct TreeWalker {
    tree: Arc<dyn ITreeClient>,
    store: Arc<dyn IRecordStore>,
    normalizer: Arc<NodeNormalizer>,
    workers: usize,
}

impl TreeWalker {
    /// Creates a walker with the given fan-out width; 1 gives a sequential
    /// traversal
    pub fn new(
        tree: Arc<dyn ITreeClient>,
        store: Arc<dyn IRecordStore>,
        normalizer: Arc<NodeNormalizer>,
        workers: usize,
    ) -> Self {
        Self {
            tree,
            store,
            normalizer,
            workers: workers.max(1),
        }
    }

    /// Walks every descendant of `root`, persisting each with its path
    ///
    /// `root` must be a folder with its own path already resolved (the
    /// coordinator assigns the empty path and persists it before walking).
    /// Any page failure aborts the whole walk; the rebuild is all-or-nothing
    /// and the caller leaves the mirror marked dirty until a walk completes.
    pub async fn walk(&self, root: Node) -> Result<WalkSummary> {
        let frontier = Arc::new(Frontier::new());
        let stats = Arc::new(WalkStats::default());

        let prefix = root.path().cloned().unwrap_or_else(NodePath::root);
        frontier
            .push(WalkItem {
                prefix,
                parent: root,
            })
            .await;

        info!(workers = self.workers, "Starting tree walk");

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        for worker_id in 0..self.workers {
            let worker = Worker {
                tree: self.tree.clone(),
                store: self.store.clone(),
                normalizer: self.normalizer.clone(),
                frontier: frontier.clone(),
                stats: stats.clone(),
            };
            tasks.spawn(async move { worker.run(worker_id).await });
        }

        let mut first_error: Option<anyhow::Error> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    frontier.abort();
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    frontier.abort();
                    first_error.get_or_insert_with(|| {
                        anyhow::anyhow!("walker task panicked or was cancelled: {e}")
                    });
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e).context("Tree walk aborted");
        }

        let summary = WalkSummary {
            nodes_written: stats.nodes_written.load(Ordering::SeqCst),
            folders_visited: stats.folders_visited.load(Ordering::SeqCst),
            skipped: stats.skipped.load(Ordering::SeqCst),
        };

        info!(
            nodes = summary.nodes_written,
            folders = summary.folders_visited,
            skipped = summary.skipped,
            "Tree walk complete"
        );

        Ok(summary)
    }
}

/// One traversal worker
struct Worker {
    tree: Arc<dyn ITreeClient>,
    store: Arc<dyn IRecordStore>,
    normalizer: Arc<NodeNormalizer>,
    frontier: Arc<Frontier>,
    stats: Arc<WalkStats>,
}

impl Worker {
    async fn run(&self, worker_id: usize) -> Result<()> {
        loop {
            if self.frontier.is_aborted() {
                // Cascade the wakeup so every sleeping sibling also exits
                self.frontier.notify.notify_one();
                return Ok(());
            }

            match self.frontier.pop().await {
                Some(item) => {
                    let result = self.process_folder(&item).await;
                    // Decrement after processing so a mid-fetch worker keeps
                    // the walk alive even while the queue is empty
                    self.frontier.complete_one();
                    if let Err(e) = result {
                        self.frontier.abort();
                        return Err(e);
                    }
                }
                None => {
                    if self.frontier.is_drained() {
                        debug!(worker_id, "Frontier drained, worker exiting");
                        self.frontier.notify.notify_one();
                        return Ok(());
                    }
                    // Queue empty but siblings are mid-fetch; wait for a
                    // push, the final completion, or an abort. notify_one
                    // stores a permit, so a signal sent between the pop
                    // above and this await is not lost.
                    self.frontier.notify.notified().await;
                }
            }
        }
    }

    /// Drains one folder's children, persists them, and enqueues sub-folders
    async fn process_folder(&self, item: &WalkItem) -> Result<()> {
        let parent = &item.parent;
        let child_prefix = item.prefix.child(parent.name());

        let mut batch: Vec<Node> = Vec::new();
        let mut sub_folders: Vec<Node> = Vec::new();
        let mut cursor: Option<PageCursor> = None;

        loop {
            let page = self
                .tree
                .list_children(parent.id(), cursor.as_ref())
                .await
                .with_context(|| format!("Child listing failed for folder {}", parent.id()))?;

            for raw in page.nodes {
                match self.normalizer.normalize(&raw) {
                    Ok(Normalized::Tracked(mut node)) => {
                        node.set_path(child_prefix.clone());
                        if node.is_folder() {
                            sub_folders.push(node.clone());
                        }
                        batch.push(node);
                    }
                    Ok(Normalized::Skipped(reason)) => {
                        debug!(id = %raw.id, ?reason, "Skipping untracked child");
                        self.stats.skipped.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        warn!(id = %raw.id, error = %e, "Skipping malformed child record");
                        self.stats.skipped.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        // A childless folder yields an empty batch and is simply done
        self.store
            .upsert_batch(&batch)
            .await
            .with_context(|| format!("Failed to persist children of {}", parent.id()))?;

        self.stats
            .nodes_written
            .fetch_add(batch.len() as u64, Ordering::SeqCst);
        self.stats.folders_visited.fetch_add(1, Ordering::SeqCst);

        debug!(
            folder = %parent.id(),
            path = %child_prefix,
            children = batch.len(),
            sub_folders = sub_folders.len(),
            "Folder drained"
        );

        for folder in sub_folders {
            self.frontier
                .push(WalkItem {
                    prefix: child_prefix.clone(),
                    parent: folder,
                })
                .await;
        }

        Ok(())
    }
}
