//! Sketchbox: agent-driven project editing with a live preview
//!
//! Sketchbox keeps a small frontend project in an in-memory file tree, applies
//! an agent's streamed `str_replace_editor` / `file_manager` tool calls to it
//! with per-file undo, and re-renders a sandboxed preview whenever the tree
//! changes.

pub mod config;
pub mod engine;
pub mod path;
pub mod preview;
pub mod resolve;
pub mod session;
pub mod tool;
pub mod tree;

pub use config::{PreviewConfig, SessionConfig, TreeConfig};
pub use engine::{EditEngine, EditError, ToolOutcome};
pub use preview::{
    DocumentSandbox, PreviewError, PreviewHandle, PreviewRenderer, PreviewState, PreviewStatus,
    RenderOutput, Sandbox,
};
pub use resolve::{ResolveError, Resolver};
pub use session::{ProjectSession, SessionBuilder};
pub use tool::{ToolCallEvent, ToolCallLog, ToolCallPhase, ToolCallRecord, ToolOperation};
pub use tree::{ProjectSnapshot, ProjectTree, SharedTree, TreeError};
