//! Versioned file/directory store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::history::History;
use crate::config::TreeConfig;
use crate::path::{self, ROOT};

/// Errors raised by tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// File or directory not found
    #[error("file not found: {0}")]
    NotFound(String),
    /// Destination already exists
    #[error("path already exists: {0}")]
    Conflict(String),
    /// Structural collision, e.g. a file used as a directory
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Whether a node is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular text file
    File,
    /// Directory
    Directory,
}

/// One file or directory in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// Canonical absolute path
    pub path: String,
    /// File or directory
    pub kind: NodeKind,
    /// Text payload (files only)
    pub content: Option<String>,
    /// Child paths in insertion order (directories only)
    pub children: Vec<String>,
}

impl FileNode {
    fn file(path: String, content: String) -> Self {
        Self {
            path,
            kind: NodeKind::File,
            content: Some(content),
            children: Vec::new(),
        }
    }

    fn directory(path: String) -> Self {
        Self {
            path,
            kind: NodeKind::Directory,
            content: None,
            children: Vec::new(),
        }
    }

    /// Whether this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Whether this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Final path segment (`/` for the root).
    pub fn name(&self) -> &str {
        path::file_name(&self.path).unwrap_or(ROOT)
    }
}

/// A row in the Code view's tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Canonical path
    pub path: String,
    /// Display name
    pub name: String,
    /// Nesting depth (children of the root have depth 0)
    pub depth: usize,
    /// File or directory
    pub kind: NodeKind,
}

/// The in-memory project tree for one session.
///
/// All mutations validate their preconditions before touching any node, so a
/// failed operation leaves the tree exactly as it was. Each successful mutation
/// increments [`version`](Self::version) by one.
#[derive(Debug, Clone)]
pub struct ProjectTree {
    nodes: HashMap<String, FileNode>,
    version: u64,
    history: History,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectTree {
    /// Create an empty tree with default settings.
    pub fn new() -> Self {
        Self::with_config(&TreeConfig::default())
    }

    /// Create an empty tree with the given settings.
    pub fn with_config(config: &TreeConfig) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT.to_string(), FileNode::directory(ROOT.to_string()));
        Self {
            nodes,
            version: 0,
            history: History::new(config.history_limit),
        }
    }

    /// Current version; increases by one on every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Undo history for content edits.
    pub fn history(&self) -> &History {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Look up a node.
    pub fn get(&self, path: &str) -> Result<&FileNode, TreeError> {
        let path = path::normalize(path);
        self.nodes.get(&path).ok_or(TreeError::NotFound(path))
    }

    /// Whether a node exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Whether `path` is a file.
    pub fn is_file(&self, path: &str) -> bool {
        self.get(path).is_ok_and(FileNode::is_file)
    }

    /// Whether `path` is a directory.
    pub fn is_dir(&self, path: &str) -> bool {
        self.get(path).is_ok_and(FileNode::is_dir)
    }

    /// Read a file's content.
    pub fn read(&self, path: &str) -> Result<&str, TreeError> {
        let node = self.get(path)?;
        node.content
            .as_deref()
            .ok_or_else(|| TreeError::InvalidPath(format!("{} is a directory", node.path)))
    }

    /// Immediate children of a directory, in insertion order.
    pub fn list(&self, path: &str) -> Result<Vec<&FileNode>, TreeError> {
        let node = self.get(path)?;
        if !node.is_dir() {
            return Err(TreeError::NotFound(node.path.clone()));
        }
        Ok(node
            .children
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .collect())
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// All files as `(path, content)`, sorted by path.
    pub fn files(&self) -> Vec<(&str, &str)> {
        let mut files: Vec<_> = self
            .nodes
            .values()
            .filter_map(|n| n.content.as_deref().map(|c| (n.path.as_str(), c)))
            .collect();
        files.sort_unstable_by(|a, b| a.0.cmp(b.0));
        files
    }

    /// Depth-first listing for display: directories before files, each group
    /// sorted by name.
    pub fn walk(&self) -> Vec<TreeEntry> {
        let mut out = Vec::new();
        self.walk_into(ROOT, 0, &mut out);
        out
    }

    fn walk_into(&self, dir: &str, depth: usize, out: &mut Vec<TreeEntry>) {
        let Some(node) = self.nodes.get(dir) else {
            return;
        };
        let mut children: Vec<&FileNode> = node
            .children
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .collect();
        children.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then(a.name().cmp(b.name())));
        for child in children {
            out.push(TreeEntry {
                path: child.path.clone(),
                name: child.name().to_string(),
                depth,
                kind: child.kind,
            });
            if child.is_dir() {
                self.walk_into(&child.path, depth + 1, out);
            }
        }
    }

    /// Paths of all files matching a glob pattern, sorted.
    pub fn find(&self, pattern: &str) -> Result<Vec<String>, TreeError> {
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| TreeError::InvalidPath(format!("{pattern}: {e}")))?;
        let mut matches: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.is_file() && pattern.matches(&n.path))
            .map(|n| n.path.clone())
            .collect();
        matches.sort_unstable();
        Ok(matches)
    }

    /// Create or overwrite a file, creating missing ancestor directories.
    pub fn put(&mut self, path: &str, content: impl Into<String>) -> Result<u64, TreeError> {
        let path = path::normalize(path);
        if path == ROOT {
            return Err(TreeError::InvalidPath("cannot write to the root".to_string()));
        }
        self.check_ancestors(&path)?;
        if self.is_dir(&path) {
            return Err(TreeError::InvalidPath(format!("{path} is a directory")));
        }

        let content = content.into();
        match self.nodes.get_mut(&path) {
            Some(node) => node.content = Some(content),
            None => {
                self.create_ancestors(&path);
                self.attach(&path);
                self.nodes
                    .insert(path.clone(), FileNode::file(path.clone(), content));
            }
        }
        Ok(self.bump())
    }

    /// Create a directory and any missing ancestors.
    ///
    /// Creating a directory that already exists is a no-op and leaves the
    /// version unchanged.
    pub fn mkdir(&mut self, path: &str) -> Result<u64, TreeError> {
        let path = path::normalize(path);
        if let Some(node) = self.nodes.get(&path) {
            return if node.is_dir() {
                Ok(self.version)
            } else {
                Err(TreeError::Conflict(path))
            };
        }
        self.check_ancestors(&path)?;
        self.create_ancestors(&path);
        self.attach(&path);
        self.nodes
            .insert(path.clone(), FileNode::directory(path.clone()));
        Ok(self.bump())
    }

    /// Remove a file, or a directory and its entire subtree.
    pub fn remove(&mut self, path: &str) -> Result<u64, TreeError> {
        let path = path::normalize(path);
        if path == ROOT {
            return Err(TreeError::InvalidPath("cannot remove the root".to_string()));
        }
        if !self.nodes.contains_key(&path) {
            return Err(TreeError::NotFound(path));
        }
        for p in self.subtree(&path) {
            self.nodes.remove(&p);
        }
        self.detach(&path);
        Ok(self.bump())
    }

    /// Move a file or subtree to a new path.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<u64, TreeError> {
        let (from, to) = self.check_relocation(from, to)?;
        let moved: Vec<FileNode> = self
            .subtree(&from)
            .iter()
            .filter_map(|p| self.nodes.remove(p))
            .collect();
        self.detach(&from);
        self.graft(moved, &from, &to);
        Ok(self.bump())
    }

    /// Duplicate a file or subtree at a new path.
    pub fn copy(&mut self, from: &str, to: &str) -> Result<u64, TreeError> {
        let (from, to) = self.check_relocation(from, to)?;
        let copied: Vec<FileNode> = self
            .subtree(&from)
            .iter()
            .filter_map(|p| self.nodes.get(p).cloned())
            .collect();
        self.graft(copied, &from, &to);
        Ok(self.bump())
    }

    fn check_relocation(&self, from: &str, to: &str) -> Result<(String, String), TreeError> {
        let from = path::normalize(from);
        let to = path::normalize(to);
        if from == ROOT || to == ROOT {
            return Err(TreeError::InvalidPath(
                "cannot relocate the root".to_string(),
            ));
        }
        if !self.nodes.contains_key(&from) {
            return Err(TreeError::NotFound(from));
        }
        if self.nodes.contains_key(&to) {
            return Err(TreeError::Conflict(to));
        }
        if path::is_within(&to, &from) {
            return Err(TreeError::InvalidPath(format!(
                "cannot place {from} inside itself at {to}"
            )));
        }
        self.check_ancestors(&to)?;
        Ok((from, to))
    }

    /// Reinsert `nodes` (a pre-order subtree rooted at `from`) under `to`.
    fn graft(&mut self, nodes: Vec<FileNode>, from: &str, to: &str) {
        self.create_ancestors(to);
        self.attach(to);
        for mut node in nodes {
            node.path = path::rebase(&node.path, from, to).unwrap_or(node.path);
            node.children = node
                .children
                .iter()
                .map(|c| path::rebase(c, from, to).unwrap_or_else(|| c.clone()))
                .collect();
            self.nodes.insert(node.path.clone(), node);
        }
    }

    /// Fail if any proper ancestor of `path` is a file.
    fn check_ancestors(&self, path: &str) -> Result<(), TreeError> {
        for ancestor in path::ancestors(path) {
            if let Some(node) = self.nodes.get(&ancestor)
                && node.is_file()
            {
                return Err(TreeError::InvalidPath(format!(
                    "{ancestor} is a file, cannot create {path}"
                )));
            }
        }
        Ok(())
    }

    /// Create every missing proper ancestor of `path`. Callers must have run
    /// [`check_ancestors`](Self::check_ancestors) first.
    fn create_ancestors(&mut self, path: &str) {
        for ancestor in path::ancestors(path) {
            if !self.nodes.contains_key(&ancestor) {
                self.attach(&ancestor);
                self.nodes
                    .insert(ancestor.clone(), FileNode::directory(ancestor));
            }
        }
    }

    fn attach(&mut self, path: &str) {
        if let Some(parent) = path::parent(path)
            && let Some(node) = self.nodes.get_mut(parent)
            && !node.children.iter().any(|c| c == path)
        {
            node.children.push(path.to_string());
        }
    }

    fn detach(&mut self, path: &str) {
        if let Some(parent) = path::parent(path)
            && let Some(node) = self.nodes.get_mut(parent)
        {
            node.children.retain(|c| c != path);
        }
    }

    /// Pre-order paths of the subtree rooted at `path` (inclusive).
    fn subtree(&self, path: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![path.to_string()];
        while let Some(p) = stack.pop() {
            if let Some(node) = self.nodes.get(&p) {
                stack.extend(node.children.iter().rev().cloned());
                out.push(p);
            }
        }
        out
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub(super) fn reset_version(&mut self) {
        self.version = 0;
    }

    /// Check structural invariants, returning a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let root = self.nodes.get(ROOT).ok_or("root is missing")?;
        if !root.is_dir() {
            return Err("root is not a directory".to_string());
        }
        for (key, node) in &self.nodes {
            if key != &node.path {
                return Err(format!("node keyed {key} has path {}", node.path));
            }
            if node.is_file() != node.content.is_some() {
                return Err(format!("{key} has inconsistent content"));
            }
            if node.is_file() && !node.children.is_empty() {
                return Err(format!("file {key} has children"));
            }
            if let Some(parent) = path::parent(key) {
                let parent_node = self
                    .nodes
                    .get(parent)
                    .ok_or_else(|| format!("{key} has no parent"))?;
                let links = parent_node.children.iter().filter(|c| *c == key).count();
                if links != 1 {
                    return Err(format!("{key} is linked {links} times from {parent}"));
                }
            }
            for child in &node.children {
                if path::parent(child) != Some(key.as_str()) {
                    return Err(format!("{child} is listed under {key}"));
                }
                if !self.nodes.contains_key(child) {
                    return Err(format!("{key} lists missing child {child}"));
                }
            }
        }
        Ok(())
    }
}
