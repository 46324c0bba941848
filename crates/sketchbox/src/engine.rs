//! Applying tool operations to the project tree.
//!
//! Each [`ToolOperation`] is applied as one atomic step: preconditions are
//! checked before anything is written, so a failed operation leaves the tree
//! and its history untouched. Content edits (create, replace, insert) record
//! the previous content so [`ToolOperation::UndoLast`] can restore it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path;
use crate::tool::{Occurrence, ToolOperation};
use crate::tree::{FileNode, HistoryEntry, Inverse, ProjectTree, SharedTree, TreeError};

/// Errors reported for a failed tool call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// Error from the file tree
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// The text to replace does not occur in the file
    #[error("old_str not found in {path}")]
    PatternNotFound {
        /// File that was searched
        path: String,
    },
    /// No recorded edit to undo
    #[error("nothing to undo for {0}")]
    NothingToUndo(String),
    /// A required argument was absent
    #[error("missing required argument: {0}")]
    MissingArgument(String),
    /// An argument was present but unusable
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Editor command outside the supported set
    #[error("unsupported command: {0:?}")]
    UnsupportedCommand(String),
    /// File-manager operation outside the supported set
    #[error("unsupported operation: {0:?}")]
    UnsupportedOperation(String),
    /// Tool this engine does not provide
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Result of a successfully applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Tree version after the operation
    pub version: u64,
    /// Short description of what happened
    pub summary: String,
    /// File content or directory listing, for views
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ToolOutcome {
    fn new(version: u64, summary: String) -> Self {
        Self {
            version,
            summary,
            content: None,
        }
    }
}

/// Applies [`ToolOperation`]s to a [`ProjectTree`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EditEngine;

impl EditEngine {
    /// Create an engine.
    pub fn new() -> Self {
        Self
    }

    /// Apply one operation under the shared tree's write lock.
    pub fn apply_shared(
        &self,
        tree: &SharedTree,
        op: &ToolOperation,
    ) -> Result<ToolOutcome, EditError> {
        tree.write(|tree| self.apply(tree, op))
    }

    /// Apply one operation.
    pub fn apply(
        &self,
        tree: &mut ProjectTree,
        op: &ToolOperation,
    ) -> Result<ToolOutcome, EditError> {
        tracing::debug!(op = op.name(), target = ?op.target(), "applying operation");
        match op {
            ToolOperation::CreateFile { path, content } => {
                let path = path::normalize(path);
                let previous = tree.read(&path).ok().map(str::to_string);
                let created_dirs: Vec<String> = path::ancestors(&path)
                    .into_iter()
                    .filter(|dir| !tree.exists(dir))
                    .collect();
                let version = tree.put(&path, content.as_str())?;
                let (summary, inverse) = match previous {
                    Some(previous) => (format!("Overwrote {path}"), Inverse::Restore(previous)),
                    None => (format!("Created {path}"), Inverse::Remove { created_dirs }),
                };
                record(tree, &path, op, inverse);
                Ok(ToolOutcome::new(version, summary))
            }
            ToolOperation::ReplaceContent {
                path,
                pattern,
                replacement,
                occurrence,
            } => {
                let path = path::normalize(path);
                let current = tree.read(&path)?.to_string();
                let (updated, count) = replace(&current, pattern, replacement, *occurrence)
                    .ok_or_else(|| EditError::PatternNotFound { path: path.clone() })?;
                let version = tree.put(&path, updated)?;
                record(tree, &path, op, Inverse::Restore(current));
                let noun = if count == 1 { "occurrence" } else { "occurrences" };
                Ok(ToolOutcome::new(
                    version,
                    format!("Replaced {count} {noun} in {path}"),
                ))
            }
            ToolOperation::InsertAt { path, line, text } => {
                let path = path::normalize(path);
                let current = tree.read(&path)?.to_string();
                let (updated, at) = insert_lines(&current, *line, text);
                let version = tree.put(&path, updated)?;
                record(tree, &path, op, Inverse::Restore(current));
                Ok(ToolOutcome::new(
                    version,
                    format!("Inserted text at line {at} of {path}"),
                ))
            }
            ToolOperation::UndoLast { path } => undo(tree, &path::normalize(path)),
            ToolOperation::ViewFile { path } => {
                let node = tree.get(path)?;
                let content = match &node.content {
                    Some(content) => content.clone(),
                    None => listing(tree, &node.path)?
                        .iter()
                        .map(|child| {
                            if child.is_dir() {
                                format!("{}/", child.name())
                            } else {
                                child.name().to_string()
                            }
                        })
                        .collect::<Vec<_>>()
                        .join("\n"),
                };
                Ok(ToolOutcome {
                    version: tree.version(),
                    summary: format!("Viewed {}", node.path),
                    content: Some(content),
                })
            }
            ToolOperation::Rename { old_path, new_path } => {
                relocate(tree, old_path, new_path, "Renamed")
            }
            ToolOperation::Move { old_path, new_path } => {
                relocate(tree, old_path, new_path, "Moved")
            }
            ToolOperation::Copy { old_path, new_path } => {
                let (from, to) = (path::normalize(old_path), path::normalize(new_path));
                let version = tree.copy(&from, &to)?;
                Ok(ToolOutcome::new(version, format!("Copied {from} to {to}")))
            }
            ToolOperation::Delete { path } => {
                let path = path::normalize(path);
                let version = tree.remove(&path)?;
                tree.history_mut().discard(&path);
                Ok(ToolOutcome::new(version, format!("Deleted {path}")))
            }
            ToolOperation::CreateDirectory { path } => {
                let path = path::normalize(path);
                let before = tree.version();
                let version = tree.mkdir(&path)?;
                let summary = if version == before {
                    format!("Directory {path} already exists")
                } else {
                    format!("Created directory {path}")
                };
                Ok(ToolOutcome::new(version, summary))
            }
            ToolOperation::UnsupportedCommand { command } => {
                Err(EditError::UnsupportedCommand(command.clone()))
            }
            ToolOperation::UnsupportedOperation { operation } => {
                Err(EditError::UnsupportedOperation(operation.clone()))
            }
            ToolOperation::UnknownTool { tool } => Err(EditError::UnknownTool(tool.clone())),
        }
    }
}

/// Children of a directory, directories first, each group by name.
fn listing<'a>(tree: &'a ProjectTree, dir: &str) -> Result<Vec<&'a FileNode>, TreeError> {
    let mut children = tree.list(dir)?;
    children.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then(a.name().cmp(b.name())));
    Ok(children)
}

fn record(tree: &mut ProjectTree, path: &str, op: &ToolOperation, inverse: Inverse) {
    tree.history_mut().push(HistoryEntry {
        path: path.to_string(),
        operation: op.clone(),
        inverse,
    });
}

fn undo(tree: &mut ProjectTree, path: &str) -> Result<ToolOutcome, EditError> {
    let entry = tree
        .history_mut()
        .pop_for(path)
        .ok_or_else(|| EditError::NothingToUndo(path.to_string()))?;

    let result = match &entry.inverse {
        Inverse::Restore(content) => tree
            .put(path, content.as_str())
            .map(|v| (v, format!("Reverted last edit to {path}"))),
        Inverse::Remove { created_dirs } => {
            let root = removal_root(tree, path, created_dirs).to_string();
            tree.remove(&root)
                .map(|v| (v, format!("Removed {path}, undoing its creation")))
        }
    };
    match result {
        Ok((version, summary)) => Ok(ToolOutcome::new(version, summary)),
        Err(e) => {
            tree.history_mut().push_back(entry);
            Err(e.into())
        }
    }
}

/// The highest directory among `created_dirs` whose subtree holds nothing
/// but `path` and the other created directories, or `path` itself.
fn removal_root<'a>(tree: &ProjectTree, path: &'a str, created_dirs: &'a [String]) -> &'a str {
    let mut root = path;
    for dir in created_dirs.iter().rev() {
        match tree.list(dir) {
            Ok(children) if children.len() == 1 && children[0].path == root => root = dir.as_str(),
            _ => break,
        }
    }
    root
}

fn relocate(
    tree: &mut ProjectTree,
    old_path: &str,
    new_path: &str,
    verb: &str,
) -> Result<ToolOutcome, EditError> {
    let (from, to) = (path::normalize(old_path), path::normalize(new_path));
    let version = tree.rename(&from, &to)?;
    tree.history_mut().rebase(&from, &to);
    Ok(ToolOutcome::new(version, format!("{verb} {from} to {to}")))
}

/// Replace the selected occurrence(s) of `pattern`, returning the new text
/// and how many replacements were made, or `None` if the selected
/// occurrence does not exist.
fn replace(
    content: &str,
    pattern: &str,
    replacement: &str,
    occurrence: Occurrence,
) -> Option<(String, usize)> {
    match occurrence {
        Occurrence::All => {
            let count = content.matches(pattern).count();
            (count > 0).then(|| (content.replace(pattern, replacement), count))
        }
        Occurrence::Nth(n) => {
            let (idx, _) = content.match_indices(pattern).nth(n.checked_sub(1)?)?;
            let mut out = String::with_capacity(content.len() + replacement.len());
            out.push_str(&content[..idx]);
            out.push_str(replacement);
            out.push_str(&content[idx + pattern.len()..]);
            Some((out, 1))
        }
    }
}

/// Insert `text` so that it begins at 1-based `line`. Lines past the end
/// append. Returns the new content and the line actually used.
fn insert_lines(content: &str, line: usize, text: &str) -> (String, usize) {
    if content.is_empty() {
        return (text.to_string(), 1);
    }
    let trailing_newline = content.ends_with('\n');
    let body = content.strip_suffix('\n').unwrap_or(content);
    let mut lines: Vec<&str> = body.split('\n').collect();
    let idx = line.saturating_sub(1).min(lines.len());
    lines.insert(idx, text);

    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    (out, idx + 1)
}
