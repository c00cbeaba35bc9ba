//! Domain model for the mirror
//!
//! Pure types with no I/O: the mirrored [`Node`](node::Node), the value
//! newtypes wrapping remote identifiers and tokens, and the persisted
//! [`MirrorState`](state::MirrorState) that drives the rebuild-vs-reconcile
//! decision.

pub mod errors;
pub mod newtypes;
pub mod node;
pub mod state;

pub use errors::DomainError;
pub use newtypes::{ChangeToken, NodeId, NodePath, PageCursor, RunId};
pub use node::{Node, NodeKind};
pub use state::{MirrorState, SyncPhase};
