//! Live preview of the project tree.
//!
//! This module provides:
//!
//! - [`build`] - links the entry module and its local dependency closure into a
//!   [`Bundle`]
//! - [`Sandbox`] - the execution boundary, with [`DocumentSandbox`] producing an
//!   HTML preview document
//! - [`PreviewRenderer`] - follows tree versions, debouncing bursts of edits and
//!   cancelling stale builds, and publishes [`PreviewState`]
//!
//! ```text
//!          version change
//!   Idle ----------------> Building ---> Rendered
//!     ^                       |             | runtime error reported
//!     |  no entry module      +--------> Failed (last output kept)
//!     +-----------------------+
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod build;
mod renderer;
mod sandbox;

pub use build::{Bundle, BundleModule, Stylesheet, build, module_specifier};
pub use renderer::{PreviewHandle, PreviewRenderer, PreviewState, PreviewStatus};
pub use sandbox::{DocumentSandbox, RenderOutput, Sandbox, execute_isolated};

/// Errors surfaced by the preview.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewError {
    /// Linking failed
    #[error("build failed: {message}")]
    BuildFailure {
        /// Human-readable description
        message: String,
        /// Module the failure is attributed to
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// 1-based line within `file`
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<usize>,
    },
    /// The sandbox reported an error or panicked
    #[error("runtime error: {message}")]
    RuntimeFailure {
        /// Human-readable description
        message: String,
    },
}
