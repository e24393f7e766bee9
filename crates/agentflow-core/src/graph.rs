//! Graph compilation and top-level execution
//!
//! [`CompiledGraph::compile`] validates an agent tree (unique names) and
//! collects every merge strategy the tree declares, so state can be rebuilt
//! with the right strategies when a checkpoint is restored. The compiled
//! graph is the only entry point for execution: it seeds the initial state,
//! routes resume payloads back to the suspended position, and drives the
//! checkpoint saver through the suspend/resume lifecycle:
//!
//! - suspension: the interruption (with its resume path) is persisted under
//!   the invocation's thread id
//! - resume: the stored checkpoint supplies the state snapshot and path; the
//!   caller's payload supplies only the decisions
//! - terminal: the thread's checkpoint is deleted
//!
//! [`CompiledGraph::describe`] renders the tree for debugging, independent
//! of execution.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agentflow_checkpoint::Checkpoint;

use crate::agent::{Agent, AgentOutcome, ExecutionContext, ResumeState};
use crate::config::{CompileConfig, RunnableConfig, DEFAULT_MAX_LOOPS};
use crate::error::{AgentFlowError, Result};
use crate::interruption::InterruptionMetadata;
use crate::messages::Message;
use crate::state::{AppendStrategy, KeyStrategy, StateStore};

/// A validated, executable agent tree.
pub struct CompiledGraph {
    root: Agent,
    config: CompileConfig,
    strategies: HashMap<String, Arc<dyn KeyStrategy>>,
}

impl Agent {
    /// Compile this tree into an executable graph.
    pub fn compile(self, config: CompileConfig) -> Result<CompiledGraph> {
        CompiledGraph::compile(self, config)
    }
}

impl CompiledGraph {
    /// Validate the tree and collect its merge strategies.
    pub fn compile(root: Agent, config: CompileConfig) -> Result<Self> {
        let mut names = HashSet::new();
        check_unique_names(&root, &mut names)?;

        let mut strategies = HashMap::new();
        collect_strategies(&root, &mut strategies);

        Ok(Self {
            root,
            config,
            strategies,
        })
    }

    /// Run the graph to a terminal state or an interruption.
    ///
    /// `input` seeds the initial state: a string becomes the first user
    /// message, an object is applied as an initial delta, `null` starts
    /// empty. When the run config carries a resume payload under the
    /// human-feedback metadata key, `input` is ignored and execution replays
    /// from the stored checkpoint instead.
    pub async fn invoke(&self, input: Value, config: RunnableConfig) -> Result<AgentOutcome> {
        let (state, resume) = match config.human_feedback()? {
            Some(decided) => {
                let (state, resume) = self.restore(&decided, &config).await?;
                (state, Some(resume))
            }
            None => (self.seed_state(input)?, None),
        };

        let ctx = ExecutionContext {
            config: Arc::new(config.clone()),
            saver: self.config.saver.clone(),
            listener: self.config.listener.clone(),
            max_loops: self.config.max_loops.unwrap_or(DEFAULT_MAX_LOOPS),
            resume,
        };

        if let Some(listener) = &self.config.listener {
            listener.on_start(self.root.name(), &state);
        }
        tracing::info!(graph = self.root.name(), resuming = ctx.is_resuming(), "invoking graph");

        let outcome = self.root.invoke(state, ctx).await?;

        match &outcome {
            AgentOutcome::Complete(state) => {
                if let (Some(saver), Some(thread_id)) =
                    (&self.config.saver, config.thread_id.as_deref())
                {
                    saver.delete(thread_id).await?;
                }
                if let Some(listener) = &self.config.listener {
                    listener.on_complete(self.root.name(), state);
                }
            }
            AgentOutcome::Interrupted(metadata) => {
                if let (Some(saver), Some(thread_id)) =
                    (&self.config.saver, config.thread_id.as_deref())
                {
                    let checkpoint = Checkpoint::new(
                        thread_id,
                        metadata.state.clone(),
                        Some(serde_json::to_value(metadata)?),
                    );
                    saver.save(thread_id, checkpoint).await?;
                }
            }
        }
        Ok(outcome)
    }

    /// Load the suspended checkpoint and validate the caller's decisions
    /// against it.
    async fn restore(
        &self,
        decided: &InterruptionMetadata,
        config: &RunnableConfig,
    ) -> Result<(StateStore, ResumeState)> {
        let thread_id = config.thread_id.as_deref().ok_or_else(|| {
            AgentFlowError::interruption_protocol("resume requires a thread id")
        })?;
        let saver = self.config.saver.as_ref().ok_or_else(|| {
            AgentFlowError::interruption_protocol("resume requires a checkpoint saver")
        })?;

        let checkpoint = saver.load(thread_id).await?.ok_or_else(|| {
            AgentFlowError::interruption_protocol(format!(
                "no suspended run for thread '{thread_id}'"
            ))
        })?;
        let interruption = checkpoint.interruption.ok_or_else(|| {
            AgentFlowError::interruption_protocol(format!(
                "checkpoint for thread '{thread_id}' is not suspended"
            ))
        })?;
        let stored: InterruptionMetadata = serde_json::from_value(interruption)?;

        if decided.node != stored.node {
            return Err(AgentFlowError::interruption_protocol(format!(
                "resume targets agent '{}' but thread '{thread_id}' suspended at '{}'",
                decided.node, stored.node
            )));
        }
        for feedback in &decided.tool_feedbacks {
            if stored.feedback_for(&feedback.id).is_none() {
                return Err(AgentFlowError::interruption_protocol(format!(
                    "feedback references unknown tool call '{}'",
                    feedback.id
                )));
            }
        }
        for pending in &stored.tool_feedbacks {
            if decided.feedback_for(&pending.id).is_none() {
                return Err(AgentFlowError::interruption_protocol(format!(
                    "no decision provided for pending tool call '{}'",
                    pending.id
                )));
            }
        }

        let state = StateStore::from_values(checkpoint.state, self.strategies.clone());
        let resume = ResumeState::new(stored, decided.tool_feedbacks.clone());
        Ok((state, resume))
    }

    fn seed_state(&self, input: Value) -> Result<StateStore> {
        let mut state = StateStore::with_strategies(self.strategies.clone());
        match input {
            Value::Null => {}
            Value::String(text) if text.is_empty() => {}
            Value::String(text) => {
                state.register_strategy(
                    crate::agent::DEFAULT_MESSAGES_KEY.to_string(),
                    Arc::new(AppendStrategy),
                );
                state.put(
                    crate::agent::DEFAULT_MESSAGES_KEY.to_string(),
                    serde_json::to_value([Message::user(text)])?,
                )?;
            }
            Value::Object(map) => state.apply_delta(&map)?,
            other => state.put("input", other)?,
        }
        state.clear_dirty();
        Ok(state)
    }

    /// Human-readable tree rendering for debugging.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        render(&self.root, "", "", &mut out);
        out
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("root", &self.root.name())
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

fn check_unique_names(agent: &Agent, seen: &mut HashSet<String>) -> Result<()> {
    if !seen.insert(agent.name().to_string()) {
        return Err(AgentFlowError::compilation(format!(
            "duplicate agent name '{}'",
            agent.name()
        )));
    }
    for child in agent.children() {
        check_unique_names(child, seen)?;
    }
    Ok(())
}

fn collect_strategies(agent: &Agent, strategies: &mut HashMap<String, Arc<dyn KeyStrategy>>) {
    if let Agent::Leaf(leaf) = agent {
        strategies
            .entry(leaf.messages_key().to_string())
            .or_insert_with(|| Arc::new(AppendStrategy));
        if let Some(key) = leaf.output_key() {
            strategies
                .entry(key.to_string())
                .or_insert_with(|| leaf.output_strategy());
        }
    }
    for child in agent.children() {
        collect_strategies(child, strategies);
    }
}

fn render(agent: &Agent, prefix: &str, child_prefix: &str, out: &mut String) {
    out.push_str(prefix);
    out.push_str(agent.name());
    out.push_str(" [");
    out.push_str(agent.kind());
    if let Some(key) = agent.output_key() {
        out.push_str(", output=");
        out.push_str(key);
    }
    out.push_str("]\n");

    let children = agent.children();
    for (index, child) in children.iter().enumerate() {
        let last = index + 1 == children.len();
        let (branch, extend) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        render(
            child,
            &format!("{child_prefix}{branch}"),
            &format!("{child_prefix}{extend}"),
            out,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{LeafAgent, SequentialAgent};
    use crate::model::{ChatModel, ModelRequest, ModelResponse};
    use async_trait::async_trait;

    struct SilentModel;

    #[async_trait]
    impl ChatModel for SilentModel {
        async fn call(&self, _request: ModelRequest) -> Result<ModelResponse> {
            Ok(ModelResponse::text("ok"))
        }
    }

    fn leaf(name: &str) -> Agent {
        Agent::Leaf(
            LeafAgent::builder()
                .name(name)
                .instruction("work")
                .model(Arc::new(SilentModel))
                .output_key(format!("{name}_out"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_duplicate_names_fail_compilation() {
        let tree = Agent::Sequential(
            SequentialAgent::builder()
                .name("pipeline")
                .agent(leaf("worker"))
                .agent(leaf("worker"))
                .build()
                .unwrap(),
        );
        let err = tree.compile(CompileConfig::new()).unwrap_err();
        assert!(matches!(err, AgentFlowError::Compilation(_)));
    }

    #[test]
    fn test_describe_renders_tree() {
        let tree = Agent::Sequential(
            SequentialAgent::builder()
                .name("pipeline")
                .agent(leaf("gather"))
                .agent(leaf("write"))
                .build()
                .unwrap(),
        );
        let graph = tree.compile(CompileConfig::new()).unwrap();
        let rendered = graph.describe();

        assert!(rendered.starts_with("pipeline [sequential]"));
        assert!(rendered.contains("├── gather [leaf, output=gather_out]"));
        assert!(rendered.contains("└── write [leaf, output=write_out]"));
    }

    #[test]
    fn test_compile_collects_strategies() {
        let graph = leaf("solo").compile(CompileConfig::new()).unwrap();
        assert!(graph.strategies.contains_key("messages"));
        assert!(graph.strategies.contains_key("solo_out"));
    }
}
