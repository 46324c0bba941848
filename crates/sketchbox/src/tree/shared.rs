//! Shared, change-publishing handle to a [`ProjectTree`].

use std::sync::{PoisonError, RwLock};

use tokio::sync::watch;

use super::snapshot::ProjectSnapshot;
use super::store::ProjectTree;

/// A project tree shared between the single writer (the edit engine) and any
/// number of readers (Code view, preview renderer).
///
/// Writers run under an exclusive lock, so readers observe either the state
/// before or after a whole operation. When a write changes the version, the
/// new version is published to every [`subscribe`](Self::subscribe)r.
#[derive(Debug)]
pub struct SharedTree {
    tree: RwLock<ProjectTree>,
    versions: watch::Sender<u64>,
}

impl SharedTree {
    /// Wrap a tree.
    pub fn new(tree: ProjectTree) -> Self {
        let (versions, _) = watch::channel(tree.version());
        Self {
            tree: RwLock::new(tree),
            versions,
        }
    }

    /// Run `f` with read access to a consistent view of the tree.
    pub fn read<R>(&self, f: impl FnOnce(&ProjectTree) -> R) -> R {
        let guard = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    /// Run `f` with exclusive access, publishing the version if it changed.
    pub fn write<R>(&self, f: impl FnOnce(&mut ProjectTree) -> R) -> R {
        let (result, before, after) = {
            let mut guard = self.tree.write().unwrap_or_else(PoisonError::into_inner);
            let before = guard.version();
            let result = f(&mut *guard);
            (result, before, guard.version())
        };
        if after != before {
            tracing::debug!(version = after, "tree changed");
            self.versions.send_replace(after);
        }
        result
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.read(ProjectTree::version)
    }

    /// Clone the whole tree.
    pub fn clone_tree(&self) -> ProjectTree {
        self.read(ProjectTree::clone)
    }

    /// Serialize the current contents.
    pub fn snapshot(&self) -> ProjectSnapshot {
        self.read(ProjectTree::snapshot)
    }

    /// Receive the version number after every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.versions.subscribe()
    }
}
