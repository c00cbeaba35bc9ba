//! TreeMirror Sync - Mirror synchronization engine
//!
//! Keeps the local record store convergent with the remote tree:
//! - [`walker`] - Full rebuild via bounded fan-out traversal
//! - [`reconciler`] - Incremental application of the change feed
//! - [`resolver`] - Memoized path resolution for orphaned nodes
//! - [`coordinator`] - The rebuild-vs-reconcile state machine
//!
//! ## Flow
//!
//! ```text
//! SyncCoordinator ──→ TreeWalker ───────┐
//!        │                              ├──→ NodeNormalizer ──→ IRecordStore
//!        └─────────→ ChangeReconciler ──┘
//!                           │
//!                     PathResolver ←──────────────────────────── IRecordStore
//! ```
//!
//! The coordinator is designed to be invoked repeatedly (on a schedule),
//! not to run continuously; every invocation either ends with a clean,
//! token-anchored mirror or leaves the persisted checkpoint untouched past
//! the last applied change page.

pub mod coordinator;
pub mod reconciler;
pub mod resolver;
pub mod walker;

pub use coordinator::{SyncCoordinator, SyncMode, SyncReport};
pub use reconciler::{ChangeReconciler, ReconcileOutcome};
pub use resolver::{PathResolver, ResolveSummary, Resolution};
pub use walker::{TreeWalker, WalkSummary};
