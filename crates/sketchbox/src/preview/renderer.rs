//! Preview state machine driven by tree versions.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::PreviewError;
use super::build::build;
use super::sandbox::{RenderOutput, Sandbox, execute_isolated};
use crate::config::PreviewConfig;
use crate::tree::SharedTree;

/// Where the preview is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    /// No entry module to render
    Idle,
    /// A build for `version` is in progress
    Building,
    /// `output` shows `version`
    Rendered,
    /// `version` failed; `output` holds the last good render, if any
    Failed,
}

/// Observable preview state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewState {
    /// Current status
    pub status: PreviewStatus,
    /// Tree version the status refers to
    pub version: u64,
    /// Most recent successful render
    pub output: Option<RenderOutput>,
    /// Error for `version` when failed
    pub error: Option<PreviewError>,
}

impl Default for PreviewState {
    fn default() -> Self {
        Self {
            status: PreviewStatus::Idle,
            version: 0,
            output: None,
            error: None,
        }
    }
}

/// Renders the shared tree through a [`Sandbox`].
pub struct PreviewRenderer {
    tree: Arc<SharedTree>,
    config: PreviewConfig,
    sandbox: Arc<dyn Sandbox>,
    state: Arc<watch::Sender<PreviewState>>,
}

impl fmt::Debug for PreviewRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRenderer")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl PreviewRenderer {
    /// Create a renderer for `tree`.
    pub fn new(
        tree: Arc<SharedTree>,
        config: PreviewConfig,
        sandbox: impl Sandbox + 'static,
    ) -> Self {
        Self::with_sandbox(tree, config, Arc::new(sandbox))
    }

    /// Create a renderer sharing an existing sandbox.
    pub fn with_sandbox(
        tree: Arc<SharedTree>,
        config: PreviewConfig,
        sandbox: Arc<dyn Sandbox>,
    ) -> Self {
        let (state, _) = watch::channel(PreviewState::default());
        Self {
            tree,
            config,
            sandbox,
            state: Arc::new(state),
        }
    }

    /// Receive state updates.
    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    /// Record an error raised by generated code while `version` was on
    /// screen, such as one posted by a [`DocumentSandbox`] frame.
    ///
    /// A rendered preview of `version` moves to `Failed` and keeps its
    /// output. Reports for any other version, or for a preview that is not
    /// rendered, are ignored. Returns whether the report was applied.
    ///
    /// [`DocumentSandbox`]: super::DocumentSandbox
    pub fn report_runtime_error(&self, version: u64, message: impl Into<String>) -> bool {
        apply_runtime_error(&self.state, version, message.into())
    }

    /// Build and execute the tree's current version, without debouncing.
    pub async fn render_once(&self) -> PreviewState {
        let tree = self.tree.clone_tree();
        let version = tree.version();
        self.transition(version, PreviewStatus::Building, |_| {});

        let bundle = match build(&tree, &self.config) {
            Ok(Some(bundle)) => bundle,
            Ok(None) => {
                self.transition(version, PreviewStatus::Idle, |state| {
                    state.output = None;
                    state.error = None;
                });
                return self.state();
            }
            Err(e) => return self.fail(version, e),
        };
        drop(tree);

        match execute_isolated(Arc::clone(&self.sandbox), bundle).await {
            Ok(output) => {
                self.transition(version, PreviewStatus::Rendered, |state| {
                    state.output = Some(output);
                    state.error = None;
                });
                self.state()
            }
            Err(e) => self.fail(version, e),
        }
    }

    /// Follow tree versions on a background task until the handle is dropped.
    pub fn spawn(self) -> PreviewHandle {
        let state = self.subscribe();
        let reporter = Arc::downgrade(&self.state);
        let task = tokio::spawn(self.run());
        PreviewHandle {
            state,
            reporter,
            task,
        }
    }

    async fn run(self) {
        let mut versions = self.tree.subscribe();
        versions.mark_changed();

        loop {
            if versions.changed().await.is_err() {
                return;
            }

            // Quiet period: every new version restarts the wait.
            loop {
                tokio::select! {
                    () = tokio::time::sleep(self.config.debounce) => break,
                    changed = versions.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
            versions.borrow_and_update();

            tokio::select! {
                _ = self.render_once() => {}
                changed = versions.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    tracing::debug!("tree changed during build, cancelling stale build");
                    versions.mark_changed();
                }
            }
        }
    }

    fn fail(&self, version: u64, error: PreviewError) -> PreviewState {
        tracing::warn!(version, error = %error, "preview failed");
        self.transition(version, PreviewStatus::Failed, |state| {
            state.error = Some(error);
        });
        self.state()
    }

    fn transition(&self, version: u64, status: PreviewStatus, f: impl FnOnce(&mut PreviewState)) {
        self.state.send_modify(|state| {
            state.version = version;
            state.status = status;
            f(state);
        });
        tracing::info!(version, status = ?status, "preview state changed");
    }
}

fn apply_runtime_error(state: &watch::Sender<PreviewState>, version: u64, message: String) -> bool {
    let applied = state.send_if_modified(|state| {
        if state.status != PreviewStatus::Rendered || state.version != version {
            return false;
        }
        state.status = PreviewStatus::Failed;
        state.error = Some(PreviewError::RuntimeFailure {
            message: message.clone(),
        });
        true
    });
    if applied {
        tracing::warn!(version, error = %message, "preview runtime error");
    } else {
        tracing::debug!(version, "ignoring runtime error for a preview no longer shown");
    }
    applied
}

/// Handle to a renderer running in the background. Dropping it stops the
/// renderer.
#[derive(Debug)]
pub struct PreviewHandle {
    state: watch::Receiver<PreviewState>,
    reporter: Weak<watch::Sender<PreviewState>>,
    task: JoinHandle<()>,
}

impl PreviewHandle {
    /// Receive state updates.
    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.clone()
    }

    /// Current state.
    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    /// Record an error raised by generated code while `version` was on
    /// screen. See [`PreviewRenderer::report_runtime_error`]; always `false`
    /// once the renderer has stopped.
    pub fn report_runtime_error(&self, version: u64, message: impl Into<String>) -> bool {
        self.reporter
            .upgrade()
            .is_some_and(|state| apply_runtime_error(&state, version, message.into()))
    }

    /// Wait until the state satisfies `pred`. Returns `None` if the renderer
    /// has stopped.
    pub async fn wait_for(&self, pred: impl FnMut(&PreviewState) -> bool) -> Option<PreviewState> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(pred).await.ok()?.clone();
        Some(state)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
