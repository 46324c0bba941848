//! Human-readable labels for tool calls.
//!
//! Labels are computed from whatever arguments have arrived so far, so they
//! are shown while a call is still streaming and regardless of whether the
//! call later succeeds.

use serde_json::Value;

use super::operation::{EDITOR_TOOL, FILE_MANAGER_TOOL};
use crate::path::display_name;

const FILE: &str = "file";
const DIRECTORY: &str = "directory";

/// Describe a tool call, e.g. `"Creating file Button.tsx"`.
///
/// Total over any input: missing, empty or mistyped arguments fall back to
/// placeholders.
pub fn display_text(tool: &str, args: &Value) -> String {
    let arg = |name: &str| args.get(name).and_then(Value::as_str);

    match tool {
        EDITOR_TOOL => {
            let name = display_name(arg("path"), FILE);
            match arg("command").unwrap_or_default() {
                "create" => format!("Creating file {name}"),
                "str_replace" => format!("Editing {name}"),
                "view" => format!("Viewing {name}"),
                "insert" => format!("Adding content to {name}"),
                "undo_edit" => format!("Undoing changes in {name}"),
                _ => format!("Modifying {name}"),
            }
        }
        FILE_MANAGER_TOOL => {
            let source = arg("old_path").or(arg("path"));
            match arg("operation").unwrap_or_default() {
                "rename" => format!(
                    "Renaming {} to {}",
                    display_name(arg("old_path"), FILE),
                    display_name(arg("new_path"), FILE)
                ),
                "delete" => format!("Deleting {}", display_name(arg("path"), FILE)),
                "create_directory" => {
                    format!("Creating directory {}", display_name(arg("path"), DIRECTORY))
                }
                "move" => format!("Moving {}", display_name(source, FILE)),
                "copy" => format!("Copying {}", display_name(source, FILE)),
                _ => "Managing files".to_string(),
            }
        }
        other => other.replace('_', " "),
    }
}
