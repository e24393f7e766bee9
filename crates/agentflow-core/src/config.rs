//! Per-invocation and compile-time configuration
//!
//! [`RunnableConfig`] travels with a single invocation: the thread id that
//! keys checkpoints, and a free-form metadata map. Resume payloads ride in
//! the metadata under [`HUMAN_FEEDBACK_METADATA_KEY`].
//!
//! [`CompileConfig`] is fixed at compile time: the checkpoint saver, an
//! optional lifecycle listener, and the loop safety bound.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use agentflow_checkpoint::CheckpointSaver;

use crate::error::{AgentFlowError, Result};
use crate::interruption::InterruptionMetadata;
use crate::state::StateStore;

/// Metadata key under which a decided [`InterruptionMetadata`] is attached
/// to resume a suspended run.
pub const HUMAN_FEEDBACK_METADATA_KEY: &str = "human_feedback";

/// Safety bound on condition-mode loop iterations unless overridden.
pub const DEFAULT_MAX_LOOPS: usize = 25;

/// Per-invocation configuration.
#[derive(Debug, Clone, Default)]
pub struct RunnableConfig {
    /// Identifies the durable conversation; required for suspend/resume
    pub thread_id: Option<String>,
    /// Free-form metadata available to hooks and the engine
    pub metadata: serde_json::Map<String, Value>,
}

impl RunnableConfig {
    pub fn builder() -> RunnableConfigBuilder {
        RunnableConfigBuilder::default()
    }

    /// The decided interruption metadata attached for resume, if any.
    pub fn human_feedback(&self) -> Result<Option<InterruptionMetadata>> {
        match self.metadata.get(HUMAN_FEEDBACK_METADATA_KEY) {
            None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }
}

/// Builder for [`RunnableConfig`].
#[derive(Debug, Clone, Default)]
pub struct RunnableConfigBuilder {
    thread_id: Option<String>,
    metadata: serde_json::Map<String, Value>,
}

impl RunnableConfigBuilder {
    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn add_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach a decided interruption payload for resume.
    pub fn human_feedback(mut self, metadata: &InterruptionMetadata) -> Result<Self> {
        let value = serde_json::to_value(metadata)?;
        self.metadata
            .insert(HUMAN_FEEDBACK_METADATA_KEY.to_string(), value);
        Ok(self)
    }

    pub fn build(self) -> RunnableConfig {
        RunnableConfig {
            thread_id: self.thread_id,
            metadata: self.metadata,
        }
    }
}

/// Observer for graph lifecycle events. All callbacks default to no-ops.
///
/// Callbacks are synchronous and run on the executing task; keep them cheap
/// and offload real work elsewhere.
pub trait LifecycleListener: Send + Sync {
    /// The graph began an invocation.
    fn on_start(&self, node: &str, state: &StateStore) {
        let _ = (node, state);
    }

    /// A node is about to execute.
    fn before_node(&self, node: &str, state: &StateStore) {
        let _ = (node, state);
    }

    /// A node finished executing.
    fn after_node(&self, node: &str, state: &StateStore) {
        let _ = (node, state);
    }

    /// A node failed.
    fn on_error(&self, node: &str, error: &AgentFlowError) {
        let _ = (node, error);
    }

    /// The invocation reached a terminal state.
    fn on_complete(&self, node: &str, state: &StateStore) {
        let _ = (node, state);
    }
}

/// Compile-time configuration for a graph.
#[derive(Clone, Default)]
pub struct CompileConfig {
    /// Persists suspended-run snapshots keyed by thread id
    pub saver: Option<Arc<dyn CheckpointSaver>>,
    /// Observes node lifecycle events
    pub listener: Option<Arc<dyn LifecycleListener>>,
    /// Safety bound on condition-mode loops; `None` means
    /// [`DEFAULT_MAX_LOOPS`]
    pub max_loops: Option<usize>,
}

impl CompileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_saver(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.saver = Some(saver);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_max_loops(mut self, max_loops: usize) -> Self {
        self.max_loops = Some(max_loops);
        self
    }
}

impl fmt::Debug for CompileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileConfig")
            .field("saver", &self.saver.is_some())
            .field("listener", &self.listener.is_some())
            .field("max_loops", &self.max_loops)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let config = RunnableConfig::builder()
            .thread_id("session-1")
            .add_metadata("user", json!("alex"))
            .build();

        assert_eq!(config.thread_id.as_deref(), Some("session-1"));
        assert_eq!(config.metadata["user"], json!("alex"));
        assert!(config.human_feedback().unwrap().is_none());
    }

    #[test]
    fn test_human_feedback_roundtrip() {
        let metadata = InterruptionMetadata::builder().node("operator").build();
        let config = RunnableConfig::builder()
            .thread_id("session-1")
            .human_feedback(&metadata)
            .unwrap()
            .build();

        let restored = config.human_feedback().unwrap().unwrap();
        assert_eq!(restored.node, "operator");
    }

    #[test]
    fn test_malformed_feedback_is_an_error() {
        let config = RunnableConfig::builder()
            .add_metadata(HUMAN_FEEDBACK_METADATA_KEY, json!("not an object"))
            .build();

        assert!(config.human_feedback().is_err());
    }
}
