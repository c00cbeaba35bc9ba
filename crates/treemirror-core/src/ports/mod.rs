//! Port definitions (hexagonal architecture)
//!
//! Traits implemented by adapter crates:
//! - [`ITreeClient`](tree_client::ITreeClient) - the remote tree
//!   (`treemirror-drive`)
//! - [`IRecordStore`](record_store::IRecordStore) - the local document store
//!   (`treemirror-store`)

pub mod record_store;
pub mod tree_client;

pub use record_store::IRecordStore;
pub use tree_client::{
    is_stale_token, ChangeEvent, ChangePage, ChildPage, ITreeClient, RawNode, StaleTokenError,
};
