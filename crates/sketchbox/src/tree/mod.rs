//! In-memory project tree.
//!
//! This module provides:
//! - [`ProjectTree`] - the versioned store of files and directories for one session
//! - [`SharedTree`] - a lock-guarded handle that publishes version changes
//! - [`ProjectSnapshot`] - the serializable form used for persistence
//!
//! ```text
//! /                    - root directory (cannot be removed)
//! ├── App.jsx          - entry module
//! └── components/
//!     └── Button.jsx
//! ```

mod history;
mod shared;
mod snapshot;
mod store;

pub use history::{History, HistoryEntry, Inverse};
pub use shared::SharedTree;
pub use snapshot::{ProjectSnapshot, SnapshotEntry};
pub use store::{FileNode, NodeKind, ProjectTree, TreeEntry, TreeError};
