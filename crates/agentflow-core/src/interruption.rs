//! Human-in-the-loop interruption protocol types
//!
//! When a leaf agent's model requests a tool call that was declared
//! approval-gated, the run suspends instead of executing it. The engine
//! returns an [`InterruptionMetadata`] describing where execution stopped,
//! the state snapshot, and one pending [`ToolFeedback`] per gated call. The
//! caller records a decision on each feedback (approve, edit, or reject) and
//! re-invokes with the decided metadata attached to the run config; the
//! engine replays from the recorded position.
//!
//! The `path` field is the engine's own breadcrumb trail through composite
//! agents, recorded root-first at suspension time. Callers never construct
//! it; on resume the stored checkpoint's path is authoritative.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::messages::ToolCall;

/// Caller's verdict on one gated tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackResult {
    /// Awaiting a decision; the initial state of every gated call
    Pending,
    /// Execute with the original arguments
    Approved,
    /// Execute with caller-modified arguments
    Edited,
    /// Do not execute; a failure result carrying the reason is synthesized
    Rejected,
}

/// One gated tool call awaiting or carrying a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFeedback {
    /// Correlation id of the gated tool call
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments; the originals while pending, possibly modified once edited
    pub arguments: Value,
    /// Why this call requires approval, from the gate declaration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The decision
    pub result: FeedbackResult,
}

impl ToolFeedback {
    /// A pending feedback for a gated call, carrying the gate's description.
    pub fn pending(call: &ToolCall, description: impl Into<String>) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            description: Some(description.into()),
            result: FeedbackResult::Pending,
        }
    }

    /// Approve with the original arguments.
    pub fn approve(&self) -> Self {
        Self {
            result: FeedbackResult::Approved,
            ..self.clone()
        }
    }

    /// Approve with modified arguments.
    pub fn edit(&self, arguments: Value) -> Self {
        Self {
            arguments,
            result: FeedbackResult::Edited,
            ..self.clone()
        }
    }

    /// Reject, replacing the description with the reason.
    pub fn reject(&self, reason: impl Into<String>) -> Self {
        Self {
            description: Some(reason.into()),
            result: FeedbackResult::Rejected,
            ..self.clone()
        }
    }

    /// Whether a decision has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.result != FeedbackResult::Pending
    }
}

/// One level of the suspension point's position inside composite agents,
/// recorded root-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumeFrame {
    /// Child index within a sequential agent
    Sequential { index: usize },
    /// Iteration number within a loop agent
    Loop { iteration: usize },
    /// Branch index within a parallel agent
    Parallel { index: usize },
}

/// Everything a caller needs to resume a suspended run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptionMetadata {
    /// Name of the leaf agent that suspended
    pub node: String,

    /// Position of the suspension point inside composite agents, root-first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<ResumeFrame>,

    /// State snapshot at suspension
    pub state: BTreeMap<String, Value>,

    /// One entry per gated tool call in the suspending model response
    pub tool_feedbacks: Vec<ToolFeedback>,
}

impl InterruptionMetadata {
    pub fn builder() -> InterruptionMetadataBuilder {
        InterruptionMetadataBuilder::default()
    }

    /// Prepend a frame; composites call this as the interruption propagates
    /// upward so the finished path reads root-first.
    pub(crate) fn push_frame(&mut self, frame: ResumeFrame) {
        self.path.insert(0, frame);
    }

    /// The feedback for a given tool call id, if present.
    pub fn feedback_for(&self, call_id: &str) -> Option<&ToolFeedback> {
        self.tool_feedbacks.iter().find(|f| f.id == call_id)
    }

    /// Whether every feedback carries a decision.
    pub fn all_resolved(&self) -> bool {
        self.tool_feedbacks.iter().all(ToolFeedback::is_resolved)
    }

    /// Copy of this metadata with one feedback replaced by a decided version,
    /// matched by call id. The usual way callers prepare a resume payload.
    pub fn with_feedback(&self, decided: ToolFeedback) -> Self {
        let mut updated = self.clone();
        for feedback in &mut updated.tool_feedbacks {
            if feedback.id == decided.id {
                *feedback = decided;
                break;
            }
        }
        updated
    }
}

/// Builder for [`InterruptionMetadata`]. Used by leaf agents at suspension
/// and by tests constructing resume payloads.
#[derive(Debug, Clone, Default)]
pub struct InterruptionMetadataBuilder {
    node: String,
    state: BTreeMap<String, Value>,
    tool_feedbacks: Vec<ToolFeedback>,
}

impl InterruptionMetadataBuilder {
    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    pub fn state(mut self, state: BTreeMap<String, Value>) -> Self {
        self.state = state;
        self
    }

    pub fn add_tool_feedback(mut self, feedback: ToolFeedback) -> Self {
        self.tool_feedbacks.push(feedback);
        self
    }

    pub fn build(self) -> InterruptionMetadata {
        InterruptionMetadata {
            node: self.node,
            path: Vec::new(),
            state: self.state,
            tool_feedbacks: self.tool_feedbacks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_metadata() -> InterruptionMetadata {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "delete_data".to_string(),
            arguments: json!({"table": "users"}),
        };
        InterruptionMetadata::builder()
            .node("operator")
            .add_tool_feedback(ToolFeedback::pending(&call, "destructive operation"))
            .build()
    }

    #[test]
    fn test_pending_until_decided() {
        let meta = sample_metadata();
        assert!(!meta.all_resolved());

        let decided = meta.with_feedback(meta.tool_feedbacks[0].approve());
        assert!(decided.all_resolved());
        assert_eq!(
            decided.feedback_for("call-1").unwrap().result,
            FeedbackResult::Approved
        );
    }

    #[test]
    fn test_edit_replaces_arguments() {
        let meta = sample_metadata();
        let edited = meta.tool_feedbacks[0].edit(json!({"table": "staging_users"}));
        assert_eq!(edited.result, FeedbackResult::Edited);
        assert_eq!(edited.arguments, json!({"table": "staging_users"}));
        assert_eq!(edited.id, "call-1");
    }

    #[test]
    fn test_path_reads_root_first() {
        let mut meta = sample_metadata();
        meta.push_frame(ResumeFrame::Sequential { index: 2 });
        meta.push_frame(ResumeFrame::Loop { iteration: 1 });

        assert_eq!(
            meta.path,
            vec![
                ResumeFrame::Loop { iteration: 1 },
                ResumeFrame::Sequential { index: 2 },
            ]
        );
    }

    #[test]
    fn test_serde_roundtrip_uses_wire_names() {
        let meta = sample_metadata();
        let encoded = serde_json::to_value(&meta).unwrap();
        assert_eq!(encoded["tool_feedbacks"][0]["result"], json!("PENDING"));

        let decoded: InterruptionMetadata = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.node, "operator");
        assert_eq!(decoded.tool_feedbacks.len(), 1);
    }
}
