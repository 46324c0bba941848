//! Agent tool-call interpretation.
//!
//! This module provides:
//!
//! - [`ToolOperation`] - the closed set of edit instructions, decoded from a
//!   tool name plus a loosely-typed argument bag
//! - [`display_text`] - the label shown for a call while it streams
//! - [`ToolCallLog`] - per-session `pending -> completed` state for each call
//!
//! # Tool Contract
//!
//! ```text
//! str_replace_editor  command = create | str_replace | view | insert | undo_edit
//!                     path, file_text, old_str, new_str, insert_line, insert_text
//! file_manager        operation = rename | delete | create_directory | move | copy
//!                     path, old_path, new_path
//! ```

mod call;
mod display;
mod operation;

pub use call::{ToolCallEvent, ToolCallLog, ToolCallPhase, ToolCallRecord};
pub use display::display_text;
pub use operation::{EDITOR_TOOL, FILE_MANAGER_TOOL, Occurrence, ToolOperation};
