//! Core library for pagewatch: the snapshot model, title extraction, and
//! the store that readers and the fetch cycle share.

pub mod extract;
pub mod mirror;
pub mod store;
pub mod types;

pub use extract::extract_title;
pub use mirror::SnapshotMirror;
pub use store::SnapshotStore;
pub use types::*;
