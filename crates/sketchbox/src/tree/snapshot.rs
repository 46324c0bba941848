//! Serializable project snapshot for persistence.
//!
//! ```json
//! {
//!   "/": { "kind": "directory" },
//!   "/App.jsx": { "kind": "file", "content": "export default ..." },
//!   "/components": { "kind": "directory" }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::store::{ProjectTree, TreeError};
use crate::config::TreeConfig;
use crate::path::{self, ROOT};

/// One entry in a [`ProjectSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SnapshotEntry {
    /// A file and its content
    File {
        /// File text
        content: String,
    },
    /// A directory
    Directory,
}

/// Mapping from absolute path to file or directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectSnapshot(pub BTreeMap<String, SnapshotEntry>);

impl ProjectSnapshot {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up one entry.
    pub fn get(&self, path: &str) -> Option<&SnapshotEntry> {
        self.0.get(path)
    }
}

impl ProjectTree {
    /// Serialize the tree's current contents.
    pub fn snapshot(&self) -> ProjectSnapshot {
        let entries = self
            .walk()
            .into_iter()
            .map(|entry| {
                let value = match self.read(&entry.path) {
                    Ok(content) => SnapshotEntry::File {
                        content: content.to_string(),
                    },
                    Err(_) => SnapshotEntry::Directory,
                };
                (entry.path, value)
            })
            .chain(std::iter::once((ROOT.to_string(), SnapshotEntry::Directory)))
            .collect();
        ProjectSnapshot(entries)
    }

    /// Rebuild a tree from a snapshot.
    ///
    /// The loaded tree starts at version 0 with empty history. Paths are
    /// normalized; entries are applied in lexicographic order so parents are
    /// created before their children.
    pub fn from_snapshot(
        snapshot: &ProjectSnapshot,
        config: &TreeConfig,
    ) -> Result<Self, TreeError> {
        let mut tree = Self::with_config(config);
        for (raw, entry) in &snapshot.0 {
            let p = path::normalize(raw);
            match entry {
                SnapshotEntry::Directory => {
                    tree.mkdir(&p)?;
                }
                SnapshotEntry::File { content } => {
                    tree.put(&p, content.as_str())?;
                }
            }
        }
        tree.reset_version();
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_shape() {
        let mut tree = ProjectTree::new();
        tree.put("/App.jsx", "app").expect("put");
        tree.mkdir("/empty").expect("mkdir");

        let json = serde_json::to_value(tree.snapshot()).expect("serialize");
        assert_eq!(json["/"], serde_json::json!({"kind": "directory"}));
        assert_eq!(json["/empty"], serde_json::json!({"kind": "directory"}));
        assert_eq!(
            json["/App.jsx"],
            serde_json::json!({"kind": "file", "content": "app"})
        );
    }

    #[test]
    fn test_reload_preserves_content() {
        let mut tree = ProjectTree::new();
        tree.put("/App.jsx", "app").expect("put");
        tree.put("/components/ui/Button.jsx", "button").expect("put");
        tree.mkdir("/assets").expect("mkdir");

        let json = serde_json::to_string(&tree.snapshot()).expect("serialize");
        let snapshot: ProjectSnapshot = serde_json::from_str(&json).expect("deserialize");
        let loaded =
            ProjectTree::from_snapshot(&snapshot, &TreeConfig::default()).expect("load");

        assert_eq!(loaded.version(), 0);
        assert!(loaded.history().is_empty());
        assert_eq!(loaded.read("/components/ui/Button.jsx").expect("read"), "button");
        assert!(loaded.is_dir("/assets"));
        assert_eq!(loaded.snapshot(), tree.snapshot());
        assert!(loaded.check_invariants().is_ok());
    }

    #[test]
    fn test_reload_rejects_structural_collision() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "/a".to_string(),
            SnapshotEntry::File {
                content: "x".to_string(),
            },
        );
        entries.insert(
            "/a/b".to_string(),
            SnapshotEntry::File {
                content: "y".to_string(),
            },
        );

        let err = ProjectTree::from_snapshot(&ProjectSnapshot(entries), &TreeConfig::default())
            .expect_err("collision");
        assert!(matches!(err, TreeError::InvalidPath(_)));
    }
}
