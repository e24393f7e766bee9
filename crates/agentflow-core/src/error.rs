//! Error types for the agentflow execution engine
//!
//! All fallible engine operations return [`Result<T>`], an alias over
//! [`AgentFlowError`]. The variants separate the phases where things go wrong:
//! compilation (building a runnable graph from an agent tree), execution
//! (running nodes), model and tool calls, and the suspend/resume protocol.

use agentflow_checkpoint::CheckpointError;
use thiserror::Error;

use crate::state::StateError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, AgentFlowError>;

/// Errors that can occur during graph compilation and execution
#[derive(Error, Debug)]
pub enum AgentFlowError {
    /// The agent tree failed structural validation at compile time
    #[error("Graph compilation failed: {0}")]
    Compilation(String),

    /// A chat model call failed inside a leaf agent
    #[error("Model call failed in agent '{agent}': {message}")]
    ModelCall { agent: String, message: String },

    /// A tool invocation failed or referenced an unknown tool
    #[error("Tool '{tool}' invocation failed: {message}")]
    ToolInvocation { tool: String, message: String },

    /// A node failed while executing
    #[error("Agent '{agent}' execution failed: {message}")]
    NodeExecution { agent: String, message: String },

    /// Execution failed outside any single node
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The suspend/resume contract was violated by the caller or the store
    #[error("Interruption protocol violation: {0}")]
    InterruptionProtocol(String),

    /// State store operation failed
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Checkpoint persistence failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentFlowError {
    /// Create a compilation error.
    pub fn compilation(message: impl Into<String>) -> Self {
        Self::Compilation(message.into())
    }

    /// Create a model call error for the given agent.
    pub fn model_call(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelCall {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Create a tool invocation error.
    pub fn tool_invocation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a node execution error.
    pub fn node_execution(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeExecution {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Create an execution error not tied to a single node.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create an interruption protocol error.
    pub fn interruption_protocol(message: impl Into<String>) -> Self {
        Self::InterruptionProtocol(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentFlowError::model_call("researcher", "connection refused");
        assert_eq!(
            err.to_string(),
            "Model call failed in agent 'researcher': connection refused"
        );

        let err = AgentFlowError::tool_invocation("search", "timeout");
        assert_eq!(err.to_string(), "Tool 'search' invocation failed: timeout");
    }

    #[test]
    fn test_state_error_converts() {
        let state_err = StateError::MergeConflict {
            key: "messages".to_string(),
            message: "expected array".to_string(),
        };
        let err: AgentFlowError = state_err.into();
        assert!(matches!(err, AgentFlowError::State(_)));
    }
}
