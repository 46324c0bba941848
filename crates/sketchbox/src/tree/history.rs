//! Per-file undo records.

use std::collections::VecDeque;

use crate::path;
use crate::tool::ToolOperation;

/// How to reverse a recorded edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inverse {
    /// Put back the previous content
    Restore(String),
    /// The file did not exist before the edit
    Remove {
        /// Directories the edit created implicitly, root-most first
        created_dirs: Vec<String>,
    },
}

/// One recorded edit and its inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// File the edit applied to
    pub path: String,
    /// The operation that was applied
    pub operation: ToolOperation,
    /// What undoes it
    pub inverse: Inverse,
}

/// Bounded, most-recent-last sequence of undo records.
///
/// Records are shared across files but popped per file, so undoing one file
/// never touches another file's records. When full, the oldest record is
/// evicted.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl History {
    /// Create an empty history holding at most `limit` records.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records for one file.
    pub fn count_for(&self, path: &str) -> usize {
        self.entries.iter().filter(|e| e.path == path).count()
    }

    /// Records in order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Remove and return the most recent record for `path`.
    pub(crate) fn pop_for(&mut self, path: &str) -> Option<HistoryEntry> {
        let idx = self.entries.iter().rposition(|e| e.path == path)?;
        self.entries.remove(idx)
    }

    /// Put a popped record back where it came from.
    pub(crate) fn push_back(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
    }

    /// Drop records for everything at or below `root`.
    pub(crate) fn discard(&mut self, root: &str) {
        self.entries.retain(|e| !path::is_within(&e.path, root));
    }

    /// Carry records for everything at or below `from` over to `to`.
    pub(crate) fn rebase(&mut self, from: &str, to: &str) {
        for entry in &mut self.entries {
            if let Some(rebased) = path::rebase(&entry.path, from, to) {
                entry.path = rebased;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, previous: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            path: path.to_string(),
            operation: ToolOperation::ViewFile {
                path: path.to_string(),
            },
            inverse: previous.map_or(
                Inverse::Remove {
                    created_dirs: Vec::new(),
                },
                |p| Inverse::Restore(p.to_string()),
            ),
        }
    }

    #[test]
    fn test_pop_is_per_file() {
        let mut history = History::new(10);
        history.push(entry("/a.js", Some("a1")));
        history.push(entry("/b.js", Some("b1")));
        history.push(entry("/a.js", Some("a2")));

        let popped = history.pop_for("/b.js").expect("b record");
        assert_eq!(popped.inverse, Inverse::Restore("b1".to_string()));
        assert_eq!(history.count_for("/a.js"), 2);

        let popped = history.pop_for("/a.js").expect("a record");
        assert_eq!(popped.inverse, Inverse::Restore("a2".to_string()));
        assert!(history.pop_for("/b.js").is_none());
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut history = History::new(2);
        history.push(entry("/a.js", None));
        history.push(entry("/b.js", None));
        history.push(entry("/c.js", None));

        assert_eq!(history.len(), 2);
        assert_eq!(history.count_for("/a.js"), 0);
    }

    #[test]
    fn test_zero_limit_records_nothing() {
        let mut history = History::new(0);
        history.push(entry("/a.js", None));
        assert!(history.is_empty());
    }

    #[test]
    fn test_discard_and_rebase() {
        let mut history = History::new(10);
        history.push(entry("/components/Button.jsx", None));
        history.push(entry("/components/ui/Icon.jsx", None));
        history.push(entry("/App.jsx", None));

        history.rebase("/components", "/widgets");
        assert_eq!(history.count_for("/widgets/Button.jsx"), 1);
        assert_eq!(history.count_for("/widgets/ui/Icon.jsx"), 1);

        history.discard("/widgets");
        assert_eq!(history.len(), 1);
        assert_eq!(history.count_for("/App.jsx"), 1);
    }
}
