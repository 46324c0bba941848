//! Streaming tool-call state.
//!
//! A tool call arrives as a series of [`ToolCallEvent`]s: zero or more
//! `pending` updates carrying the arguments received so far, then one
//! `completed` event with the final arguments. [`ToolCallLog`] folds these
//! into [`ToolCallRecord`]s and hands each completed call out for execution
//! exactly once. Pending calls are never executed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::display::display_text;
use super::operation::ToolOperation;
use crate::engine::EditError;

/// Lifecycle of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallPhase {
    /// Arguments are still streaming
    Pending,
    /// Arguments are final
    Completed,
}

/// One event from the chat transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEvent {
    /// Call identifier, stable across updates
    pub id: String,
    /// Tool name
    pub tool_name: String,
    /// Arguments received so far
    #[serde(default)]
    pub args: Value,
    /// Whether the arguments are final
    pub phase: ToolCallPhase,
}

impl ToolCallEvent {
    /// A streaming update.
    pub fn pending(id: impl Into<String>, tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            args,
            phase: ToolCallPhase::Pending,
        }
    }

    /// The final update.
    pub fn completed(id: impl Into<String>, tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            args,
            phase: ToolCallPhase::Completed,
        }
    }
}

/// Display and result state of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Call identifier
    pub id: String,
    /// Tool name
    pub tool_name: String,
    /// Operation variant name once decoded (`None` while pending or if
    /// decoding failed)
    pub kind: Option<String>,
    /// Raw arguments
    pub args: Value,
    /// Lifecycle phase
    pub phase: ToolCallPhase,
    /// Short result text once the call has been executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    /// Whether execution failed
    #[serde(default)]
    pub failed: bool,
}

impl ToolCallRecord {
    fn new(event: &ToolCallEvent) -> Self {
        Self {
            id: event.id.clone(),
            tool_name: event.tool_name.clone(),
            kind: None,
            args: Value::Null,
            phase: ToolCallPhase::Pending,
            result_summary: None,
            failed: false,
        }
    }

    /// Label for the call, computed from the arguments received so far.
    pub fn display_text(&self) -> String {
        display_text(&self.tool_name, &self.args)
    }

    /// Whether the arguments are final.
    pub fn is_completed(&self) -> bool {
        self.phase == ToolCallPhase::Completed
    }

    fn merge_args(&mut self, update: Value) {
        match (&mut self.args, update) {
            (Value::Object(current), Value::Object(update)) => {
                for (key, value) in update {
                    current.insert(key, value);
                }
            }
            (_, Value::Null) => {}
            (current, update) => *current = update,
        }
    }
}

/// Session-scoped, ordered collection of tool calls.
#[derive(Debug, Default, Clone)]
pub struct ToolCallLog {
    records: Vec<ToolCallRecord>,
    index: HashMap<String, usize>,
}

impl ToolCallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the log.
    ///
    /// Pending events merge their arguments into the record. A completed
    /// event carries the final argument bag, which replaces what streamed in
    /// before; a null bag keeps the streamed arguments.
    ///
    /// Returns `Some` only for the first `completed` event of a call: the
    /// decoded operation to execute, or the validation error to report.
    pub fn observe(&mut self, event: ToolCallEvent) -> Option<Result<ToolOperation, EditError>> {
        let idx = match self.index.get(&event.id) {
            Some(&idx) => idx,
            None => {
                self.records.push(ToolCallRecord::new(&event));
                self.index.insert(event.id.clone(), self.records.len() - 1);
                self.records.len() - 1
            }
        };
        let record = &mut self.records[idx];

        if record.is_completed() {
            tracing::warn!(id = %event.id, "ignoring update for completed tool call");
            return None;
        }

        if event.phase == ToolCallPhase::Pending {
            record.merge_args(event.args);
            return None;
        }
        if !event.args.is_null() {
            record.args = event.args;
        }

        record.phase = ToolCallPhase::Completed;
        let decoded = ToolOperation::decode(&record.tool_name, &record.args);
        if let Ok(op) = &decoded {
            record.kind = Some(op.name().to_string());
        }
        Some(decoded)
    }

    /// Attach the execution result to a completed call.
    pub fn finish(&mut self, id: &str, summary: impl Into<String>, failed: bool) {
        if let Some(record) = self.index.get(id).and_then(|&i| self.records.get_mut(i)) {
            record.result_summary = Some(summary.into());
            record.failed = failed;
        }
    }

    /// Look up a call.
    pub fn get(&self, id: &str) -> Option<&ToolCallRecord> {
        self.index.get(id).and_then(|&i| self.records.get(i))
    }

    /// All calls in arrival order.
    pub fn records(&self) -> &[ToolCallRecord] {
        &self.records
    }

    /// Number of calls seen.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no calls have been seen.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::EDITOR_TOOL;
    use serde_json::json;

    #[test]
    fn test_pending_updates_merge_and_never_dispatch() {
        let mut log = ToolCallLog::new();

        let out = log.observe(ToolCallEvent::pending(
            "call-1",
            EDITOR_TOOL,
            json!({"command": "create"}),
        ));
        assert!(out.is_none());
        let record = log.get("call-1").expect("record");
        assert_eq!(record.display_text(), "Creating file file");

        let out = log.observe(ToolCallEvent::pending(
            "call-1",
            EDITOR_TOOL,
            json!({"path": "/components/Button.jsx"}),
        ));
        assert!(out.is_none());
        let record = log.get("call-1").expect("record");
        assert_eq!(record.display_text(), "Creating file Button.jsx");
        assert_eq!(record.phase, ToolCallPhase::Pending);
        assert_eq!(record.kind, None);
    }

    #[test]
    fn test_completion_dispatches_once() {
        let mut log = ToolCallLog::new();
        log.observe(ToolCallEvent::pending(
            "call-1",
            EDITOR_TOOL,
            json!({"command": "create", "path": "/App.jsx"}),
        ));

        let out = log
            .observe(ToolCallEvent::completed(
                "call-1",
                EDITOR_TOOL,
                json!({"command": "create", "path": "/App.jsx", "file_text": "<stub>"}),
            ))
            .expect("dispatch");
        assert_eq!(
            out.expect("decoded"),
            ToolOperation::CreateFile {
                path: "/App.jsx".to_string(),
                content: "<stub>".to_string()
            }
        );
        assert_eq!(
            log.get("call-1").and_then(|r| r.kind.as_deref()),
            Some("CreateFile")
        );

        let again = log.observe(ToolCallEvent::completed(
            "call-1",
            EDITOR_TOOL,
            json!({"file_text": "changed"}),
        ));
        assert!(again.is_none());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_completion_replaces_streamed_arguments() {
        let mut log = ToolCallLog::new();
        log.observe(ToolCallEvent::pending(
            "call-1",
            EDITOR_TOOL,
            json!({"command": "str_replace", "path": "/App.jsx", "old_str": "draft"}),
        ));

        let out = log
            .observe(ToolCallEvent::completed(
                "call-1",
                EDITOR_TOOL,
                json!({"command": "create", "path": "/App.jsx", "file_text": "final"}),
            ))
            .expect("dispatch");
        assert_eq!(
            out.expect("decoded"),
            ToolOperation::CreateFile {
                path: "/App.jsx".to_string(),
                content: "final".to_string()
            }
        );
        let record = log.get("call-1").expect("record");
        assert!(record.args.get("old_str").is_none());
    }

    #[test]
    fn test_completion_without_arguments_keeps_streamed_ones() {
        let mut log = ToolCallLog::new();
        log.observe(ToolCallEvent::pending(
            "call-1",
            EDITOR_TOOL,
            json!({"command": "view", "path": "/App.jsx"}),
        ));

        let out = log
            .observe(ToolCallEvent::completed("call-1", EDITOR_TOOL, Value::Null))
            .expect("dispatch");
        assert_eq!(
            out.expect("decoded"),
            ToolOperation::ViewFile {
                path: "/App.jsx".to_string()
            }
        );
    }

    #[test]
    fn test_completion_with_missing_argument() {
        let mut log = ToolCallLog::new();
        let out = log
            .observe(ToolCallEvent::completed(
                "call-9",
                EDITOR_TOOL,
                json!({"command": "create"}),
            ))
            .expect("dispatch");

        assert_eq!(
            out.expect_err("missing path"),
            EditError::MissingArgument("path".to_string())
        );
        assert!(log.get("call-9").expect("record").is_completed());
    }

    #[test]
    fn test_finish_records_summary() {
        let mut log = ToolCallLog::new();
        log.observe(ToolCallEvent::completed(
            "call-1",
            EDITOR_TOOL,
            json!({"command": "view", "path": "/App.jsx"}),
        ));
        log.finish("call-1", "file not found: /App.jsx", true);

        let record = log.get("call-1").expect("record");
        assert_eq!(record.result_summary.as_deref(), Some("file not found: /App.jsx"));
        assert!(record.failed);
    }

    #[test]
    fn test_event_deserialization() {
        let event: ToolCallEvent = serde_json::from_value(json!({
            "id": "call-1",
            "tool_name": "file_manager",
            "args": {"operation": "delete", "path": "/a.js"},
            "phase": "completed"
        }))
        .expect("parse event");

        assert_eq!(event.phase, ToolCallPhase::Completed);
        assert_eq!(event.args["path"], "/a.js");
    }
}
