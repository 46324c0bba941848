//! Decoding raw tool calls into [`ToolOperation`]s.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::EditError;
use crate::path;

/// Name of the file-editing tool.
pub const EDITOR_TOOL: &str = "str_replace_editor";

/// Name of the file-management tool.
pub const FILE_MANAGER_TOOL: &str = "file_manager";

/// Which occurrence of a pattern a replacement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occurrence {
    /// The n-th occurrence, 1-based
    Nth(usize),
    /// Every occurrence
    All,
}

impl Default for Occurrence {
    fn default() -> Self {
        Occurrence::Nth(1)
    }
}

/// A validated edit instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOperation {
    /// Create or overwrite a file
    CreateFile {
        /// Target file
        path: String,
        /// Full file text
        content: String,
    },
    /// Replace a literal pattern inside a file
    ReplaceContent {
        /// Target file
        path: String,
        /// Literal text to find
        pattern: String,
        /// Text to put in its place
        replacement: String,
        /// Which occurrence to replace
        occurrence: Occurrence,
    },
    /// Insert text as new line(s) at a 1-based line index
    InsertAt {
        /// Target file
        path: String,
        /// 1-based line the text becomes
        line: usize,
        /// Text to insert
        text: String,
    },
    /// Undo the last recorded edit to a file
    UndoLast {
        /// Target file
        path: String,
    },
    /// Read a file or directory listing
    ViewFile {
        /// Target path
        path: String,
    },
    /// Rename a file or directory
    Rename {
        /// Existing path
        old_path: String,
        /// New path
        new_path: String,
    },
    /// Delete a file or directory subtree
    Delete {
        /// Target path
        path: String,
    },
    /// Create a directory (idempotent)
    CreateDirectory {
        /// Target directory
        path: String,
    },
    /// Move a file or directory
    Move {
        /// Existing path
        old_path: String,
        /// Destination path
        new_path: String,
    },
    /// Copy a file or directory
    Copy {
        /// Existing path
        old_path: String,
        /// Destination path
        new_path: String,
    },
    /// Editor call with a command outside the supported set
    UnsupportedCommand {
        /// The command as received
        command: String,
    },
    /// File-manager call with an operation outside the supported set
    UnsupportedOperation {
        /// The operation as received
        operation: String,
    },
    /// Call to a tool this engine does not provide
    UnknownTool {
        /// The tool name as received
        tool: String,
    },
}

impl ToolOperation {
    /// Decode a completed tool call.
    ///
    /// Unrecognized commands and operations decode to explicit unsupported
    /// variants; missing required arguments fail with
    /// [`EditError::MissingArgument`]. Fields not used by the selected
    /// operation are ignored.
    pub fn decode(tool: &str, args: &serde_json::Value) -> Result<Self, EditError> {
        match tool {
            EDITOR_TOOL => decode_editor(parse_args(args)?),
            FILE_MANAGER_TOOL => decode_manager(parse_args(args)?),
            other => Ok(ToolOperation::UnknownTool {
                tool: other.to_string(),
            }),
        }
    }

    /// Variant name, e.g. `"CreateFile"`.
    pub fn name(&self) -> &'static str {
        match self {
            ToolOperation::CreateFile { .. } => "CreateFile",
            ToolOperation::ReplaceContent { .. } => "ReplaceContent",
            ToolOperation::InsertAt { .. } => "InsertAt",
            ToolOperation::UndoLast { .. } => "UndoLast",
            ToolOperation::ViewFile { .. } => "ViewFile",
            ToolOperation::Rename { .. } => "Rename",
            ToolOperation::Delete { .. } => "Delete",
            ToolOperation::CreateDirectory { .. } => "CreateDirectory",
            ToolOperation::Move { .. } => "Move",
            ToolOperation::Copy { .. } => "Copy",
            ToolOperation::UnsupportedCommand { .. } => "UnsupportedCommand",
            ToolOperation::UnsupportedOperation { .. } => "UnsupportedOperation",
            ToolOperation::UnknownTool { .. } => "UnknownTool",
        }
    }

    /// Whether applying this operation can change the tree.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            ToolOperation::ViewFile { .. }
                | ToolOperation::UnsupportedCommand { .. }
                | ToolOperation::UnsupportedOperation { .. }
                | ToolOperation::UnknownTool { .. }
        )
    }

    /// Primary path the operation acts on, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            ToolOperation::CreateFile { path, .. }
            | ToolOperation::ReplaceContent { path, .. }
            | ToolOperation::InsertAt { path, .. }
            | ToolOperation::UndoLast { path }
            | ToolOperation::ViewFile { path }
            | ToolOperation::Delete { path }
            | ToolOperation::CreateDirectory { path } => Some(path),
            ToolOperation::Rename { old_path, .. }
            | ToolOperation::Move { old_path, .. }
            | ToolOperation::Copy { old_path, .. } => Some(old_path),
            _ => None,
        }
    }
}

/// Arguments accepted by the file-editing tool.
#[derive(Debug, Default, Deserialize)]
struct EditorArgs {
    command: Option<String>,
    path: Option<String>,
    file_text: Option<String>,
    old_str: Option<String>,
    new_str: Option<String>,
    insert_line: Option<usize>,
    insert_text: Option<String>,
    occurrence: Option<usize>,
    #[serde(default)]
    replace_all: bool,
}

/// Arguments accepted by the file-management tool.
#[derive(Debug, Default, Deserialize)]
struct ManagerArgs {
    operation: Option<String>,
    path: Option<String>,
    old_path: Option<String>,
    new_path: Option<String>,
}

fn parse_args<T: DeserializeOwned + Default>(args: &serde_json::Value) -> Result<T, EditError> {
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args.clone()).map_err(|e| EditError::InvalidArgument(e.to_string()))
}

fn required(value: Option<String>, name: &str) -> Result<String, EditError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EditError::MissingArgument(name.to_string())),
    }
}

fn required_path(value: Option<String>, name: &str) -> Result<String, EditError> {
    required(value, name).map(|p| path::normalize(&p))
}

fn decode_editor(args: EditorArgs) -> Result<ToolOperation, EditError> {
    let command = args.command.unwrap_or_default();
    let op = match command.as_str() {
        "create" => ToolOperation::CreateFile {
            path: required_path(args.path, "path")?,
            content: args.file_text.unwrap_or_default(),
        },
        "str_replace" => {
            let path = required_path(args.path, "path")?;
            let pattern = args
                .old_str
                .ok_or_else(|| EditError::MissingArgument("old_str".to_string()))?;
            if pattern.is_empty() {
                return Err(EditError::InvalidArgument(format!(
                    "old_str for {path} must not be empty"
                )));
            }
            let occurrence = match (args.replace_all, args.occurrence) {
                (true, _) => Occurrence::All,
                (false, Some(0)) => {
                    return Err(EditError::InvalidArgument(
                        "occurrence is 1-based".to_string(),
                    ));
                }
                (false, Some(n)) => Occurrence::Nth(n),
                (false, None) => Occurrence::default(),
            };
            ToolOperation::ReplaceContent {
                path,
                pattern,
                replacement: args.new_str.unwrap_or_default(),
                occurrence,
            }
        }
        "insert" => ToolOperation::InsertAt {
            path: required_path(args.path, "path")?,
            line: args
                .insert_line
                .ok_or_else(|| EditError::MissingArgument("insert_line".to_string()))?
                .max(1),
            text: args
                .insert_text
                .or(args.new_str)
                .ok_or_else(|| EditError::MissingArgument("insert_text".to_string()))?,
        },
        "view" => ToolOperation::ViewFile {
            path: required_path(args.path, "path")?,
        },
        "undo_edit" => ToolOperation::UndoLast {
            path: required_path(args.path, "path")?,
        },
        _ => ToolOperation::UnsupportedCommand { command },
    };
    Ok(op)
}

fn decode_manager(args: ManagerArgs) -> Result<ToolOperation, EditError> {
    let operation = args.operation.unwrap_or_default();
    let op = match operation.as_str() {
        "rename" => ToolOperation::Rename {
            old_path: required_path(args.old_path.or(args.path), "old_path")?,
            new_path: required_path(args.new_path, "new_path")?,
        },
        "move" => ToolOperation::Move {
            old_path: required_path(args.old_path.or(args.path), "old_path")?,
            new_path: required_path(args.new_path, "new_path")?,
        },
        "copy" => ToolOperation::Copy {
            old_path: required_path(args.old_path.or(args.path), "old_path")?,
            new_path: required_path(args.new_path, "new_path")?,
        },
        "delete" => ToolOperation::Delete {
            path: required_path(args.path, "path")?,
        },
        "create_directory" => ToolOperation::CreateDirectory {
            path: required_path(args.path, "path")?,
        },
        _ => ToolOperation::UnsupportedOperation { operation },
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_create() {
        let op = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "create", "path": "/App.jsx", "file_text": "<stub>"}),
        )
        .expect("decode");

        assert_eq!(
            op,
            ToolOperation::CreateFile {
                path: "/App.jsx".to_string(),
                content: "<stub>".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_normalizes_paths() {
        let op = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "view", "path": "components//Button.jsx"}),
        )
        .expect("decode");
        assert_eq!(op.target(), Some("/components/Button.jsx"));
    }

    #[test]
    fn test_decode_str_replace_defaults_to_first() {
        let op = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "str_replace", "path": "/App.jsx", "old_str": "a", "new_str": "b"}),
        )
        .expect("decode");

        let ToolOperation::ReplaceContent { occurrence, .. } = op else {
            panic!("expected ReplaceContent, got {op:?}");
        };
        assert_eq!(occurrence, Occurrence::Nth(1));
    }

    #[test]
    fn test_decode_str_replace_explicit_occurrence() {
        let nth = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "str_replace", "path": "/a.js", "old_str": "x", "occurrence": 3}),
        )
        .expect("decode");
        assert!(matches!(
            nth,
            ToolOperation::ReplaceContent { occurrence: Occurrence::Nth(3), ref replacement, .. }
                if replacement.is_empty()
        ));

        let all = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "str_replace", "path": "/a.js", "old_str": "x", "replace_all": true}),
        )
        .expect("decode");
        assert!(matches!(
            all,
            ToolOperation::ReplaceContent { occurrence: Occurrence::All, .. }
        ));
    }

    #[test]
    fn test_decode_str_replace_rejects_empty_pattern() {
        let err = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "str_replace", "path": "/a.js", "old_str": ""}),
        )
        .expect_err("empty old_str");
        assert!(matches!(err, EditError::InvalidArgument(_)));
    }

    #[test]
    fn test_decode_insert() {
        let op = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "insert", "path": "/a.js", "insert_line": 0, "insert_text": "x"}),
        )
        .expect("decode");
        assert!(matches!(op, ToolOperation::InsertAt { line: 1, .. }));

        let fallback = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "insert", "path": "/a.js", "insert_line": 4, "new_str": "y"}),
        )
        .expect("decode");
        assert!(matches!(fallback, ToolOperation::InsertAt { line: 4, ref text, .. } if text == "y"));
    }

    #[test]
    fn test_missing_path_is_rejected() {
        let err = ToolOperation::decode(EDITOR_TOOL, &json!({"command": "create"}))
            .expect_err("missing path");
        assert_eq!(err, EditError::MissingArgument("path".to_string()));

        let err = ToolOperation::decode(
            FILE_MANAGER_TOOL,
            &json!({"operation": "rename", "old_path": "/a.js"}),
        )
        .expect_err("missing new_path");
        assert_eq!(err, EditError::MissingArgument("new_path".to_string()));
    }

    #[test]
    fn test_unknown_command_degrades() {
        let op = ToolOperation::decode(EDITOR_TOOL, &json!({"command": "format", "path": "/a.js"}))
            .expect("decode");
        assert_eq!(
            op,
            ToolOperation::UnsupportedCommand {
                command: "format".to_string()
            }
        );
        assert!(!op.is_mutating());

        let op = ToolOperation::decode(FILE_MANAGER_TOOL, &json!({})).expect("decode");
        assert!(matches!(op, ToolOperation::UnsupportedOperation { .. }));

        let op = ToolOperation::decode("web_search", &json!({"q": "x"})).expect("decode");
        assert_eq!(op.name(), "UnknownTool");
    }

    #[test]
    fn test_manager_source_falls_back_to_path() {
        let op = ToolOperation::decode(
            FILE_MANAGER_TOOL,
            &json!({"operation": "move", "path": "/a.js", "new_path": "/lib/a.js"}),
        )
        .expect("decode");
        assert_eq!(
            op,
            ToolOperation::Move {
                old_path: "/a.js".to_string(),
                new_path: "/lib/a.js".to_string(),
            }
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let op = ToolOperation::decode(
            FILE_MANAGER_TOOL,
            &json!({"operation": "delete", "path": "/a.js", "force": true, "recursive": "yes"}),
        )
        .expect("decode");
        assert_eq!(
            op,
            ToolOperation::Delete {
                path: "/a.js".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_argument_type_is_invalid() {
        let err = ToolOperation::decode(
            EDITOR_TOOL,
            &json!({"command": "insert", "path": "/a.js", "insert_line": "three"}),
        )
        .expect_err("bad type");
        assert!(matches!(err, EditError::InvalidArgument(_)));
    }
}
