//! One project session: tree, tool-call log, edit engine and preview wiring.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{PreviewConfig, SessionConfig};
use crate::engine::{EditEngine, EditError, ToolOutcome};
use crate::preview::{PreviewHandle, PreviewRenderer, Sandbox};
use crate::tool::{ToolCallEvent, ToolCallLog, ToolCallRecord, ToolOperation};
use crate::tree::{ProjectSnapshot, ProjectTree, SharedTree, TreeError};

/// Builder for a [`ProjectSession`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use sketchbox::session::ProjectSession;
///
/// let session = ProjectSession::builder()
///     .history_limit(50)
///     .debounce(Duration::from_millis(300))
///     .build()
///     .expect("empty project");
/// assert_eq!(session.version(), 0);
/// ```
#[derive(Debug, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    snapshot: Option<ProjectSnapshot>,
}

impl SessionBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the preview configuration.
    pub fn preview(mut self, preview: PreviewConfig) -> Self {
        self.config.preview = preview;
        self
    }

    /// Bound the undo history.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.tree.history_limit = limit;
        self
    }

    /// Set the preview's quiet period.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config.preview.debounce = debounce;
        self
    }

    /// Try `path` before the configured entry points.
    pub fn entry_point(mut self, path: impl Into<String>) -> Self {
        self.config.preview.entry_points.insert(0, path.into());
        self
    }

    /// Start from a saved snapshot instead of an empty tree.
    pub fn snapshot(mut self, snapshot: ProjectSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Build the session.
    pub fn build(self) -> Result<ProjectSession, TreeError> {
        let tree = match &self.snapshot {
            Some(snapshot) => ProjectTree::from_snapshot(snapshot, &self.config.tree)?,
            None => ProjectTree::with_config(&self.config.tree),
        };
        tracing::debug!(nodes = tree.len(), "project session created");
        Ok(ProjectSession {
            tree: Arc::new(SharedTree::new(tree)),
            log: ToolCallLog::new(),
            engine: EditEngine::new(),
            config: self.config,
        })
    }
}

/// A project session.
///
/// Tool calls are handled one at a time in the order their completions
/// arrive; the preview reads the shared tree concurrently.
#[derive(Debug)]
pub struct ProjectSession {
    tree: Arc<SharedTree>,
    log: ToolCallLog,
    engine: EditEngine,
    config: SessionConfig,
}

impl Default for ProjectSession {
    fn default() -> Self {
        Self {
            tree: Arc::new(SharedTree::new(ProjectTree::new())),
            log: ToolCallLog::new(),
            engine: EditEngine::new(),
            config: SessionConfig::default(),
        }
    }
}

impl ProjectSession {
    /// An empty session with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// The shared tree.
    pub fn tree(&self) -> &Arc<SharedTree> {
        &self.tree
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Every tool call seen so far.
    pub fn log(&self) -> &ToolCallLog {
        &self.log
    }

    /// Current tree version.
    pub fn version(&self) -> u64 {
        self.tree.version()
    }

    /// Fold one tool-call event into the session.
    ///
    /// Pending events only update the call's display state. The first
    /// completed event for a call decodes and applies it; the outcome (or
    /// error) becomes the record's result. For views the result is the
    /// content read.
    pub fn handle(&mut self, event: ToolCallEvent) -> Option<ToolCallRecord> {
        let id = event.id.clone();
        if let Some(decoded) = self.log.observe(event) {
            let result = decoded.and_then(|op| self.apply(&op));
            let (summary, failed) = match result {
                Ok(ToolOutcome {
                    summary, content, ..
                }) => (content.unwrap_or(summary), false),
                Err(e) => (e.to_string(), true),
            };
            self.log.finish(&id, summary, failed);

            if let Some(record) = self.log.get(&id) {
                if failed {
                    tracing::warn!(
                        id = %id,
                        tool = %record.tool_name,
                        display = %record.display_text(),
                        error = record.result_summary.as_deref().unwrap_or_default(),
                        "tool call failed"
                    );
                } else {
                    tracing::info!(
                        id = %id,
                        tool = %record.tool_name,
                        display = %record.display_text(),
                        version = self.tree.version(),
                        "tool call applied"
                    );
                }
            }
        }
        self.log.get(&id).cloned()
    }

    /// Apply one operation directly, bypassing the tool-call log.
    pub fn apply(&self, op: &ToolOperation) -> Result<ToolOutcome, EditError> {
        self.engine.apply_shared(&self.tree, op)
    }

    /// A renderer over this session's tree.
    pub fn renderer(&self, sandbox: impl Sandbox + 'static) -> PreviewRenderer {
        PreviewRenderer::new(
            Arc::clone(&self.tree),
            self.config.preview.clone(),
            sandbox,
        )
    }

    /// Start a background renderer following this session's changes.
    pub fn spawn_preview(&self, sandbox: impl Sandbox + 'static) -> PreviewHandle {
        self.renderer(sandbox).spawn()
    }

    /// Serializable copy of the project.
    pub fn snapshot(&self) -> ProjectSnapshot {
        self.tree.snapshot()
    }
}
