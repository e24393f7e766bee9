//! Parallel agent: children run concurrently on private state copies
//!
//! Each child is spawned as its own task with a clone of the input state
//! (dirty tracking reset, so the child's writes are its delta). The join
//! waits for every child even when one fails, so no late writes leak past
//! the parent. Results are then scanned in declaration order: the first
//! error wins, then the first interruption, and only if every child
//! completed are the deltas merged - which makes the merged result
//! reproducible regardless of completion order.

use std::fmt;
use std::sync::Arc;

use crate::agent::{Agent, AgentOutcome, ExecutionContext};
use crate::error::{AgentFlowError, Result};
use crate::hook::{self, AgentHook};
use crate::interruption::ResumeFrame;
use crate::state::StateStore;

/// How a parallel agent combines its children's writes.
#[derive(Clone)]
pub enum ParallelMergeStrategy {
    /// Collect each child's designated output value, in declaration order,
    /// into a JSON array under `merge_key`. Children must not write
    /// `merge_key` themselves.
    CollectList { merge_key: String },
    /// Apply each child's dirty-key delta to the parent state in declaration
    /// order, through the normal merge strategies.
    MergeDeltas,
}

impl fmt::Debug for ParallelMergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollectList { merge_key } => {
                f.debug_struct("CollectList").field("merge_key", merge_key).finish()
            }
            Self::MergeDeltas => f.write_str("MergeDeltas"),
        }
    }
}

/// Runs its children concurrently and merges their writes deterministically.
#[derive(Clone)]
pub struct ParallelAgent {
    name: String,
    children: Vec<Agent>,
    merge: ParallelMergeStrategy,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl ParallelAgent {
    pub fn builder() -> ParallelAgentBuilder {
        ParallelAgentBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Agent] {
        &self.children
    }

    pub(crate) fn merge_output_key(&self) -> Option<&str> {
        match &self.merge {
            ParallelMergeStrategy::CollectList { merge_key } => Some(merge_key),
            ParallelMergeStrategy::MergeDeltas => None,
        }
    }

    pub(crate) async fn invoke(
        &self,
        mut state: StateStore,
        ctx: &ExecutionContext,
    ) -> Result<AgentOutcome> {
        let resume_index = match (&ctx.resume, ctx.current_frame()) {
            (None, _) => None,
            (Some(_), Some(ResumeFrame::Parallel { index })) => Some(*index),
            (Some(_), Some(other)) => {
                return Err(AgentFlowError::interruption_protocol(format!(
                    "parallel agent '{}' cannot resume from frame {other:?}",
                    self.name
                )))
            }
            (Some(_), None) => {
                return Err(AgentFlowError::interruption_protocol(format!(
                    "resume path ends at composite agent '{}'",
                    self.name
                )))
            }
        };
        if let Some(index) = resume_index {
            if index >= self.children.len() {
                return Err(AgentFlowError::interruption_protocol(format!(
                    "resume index {index} out of range for parallel agent '{}'",
                    self.name
                )));
            }
        }

        if resume_index.is_none() {
            hook::run_before_agent(&self.hooks, &mut state, &ctx.config).await?;
        }

        let handles: Vec<_> = self
            .children
            .iter()
            .enumerate()
            .map(|(index, child)| {
                let child = child.clone();
                let child_ctx = if Some(index) == resume_index {
                    ctx.descend()
                } else {
                    ctx.without_resume()
                };
                let mut child_state = state.clone();
                child_state.clear_dirty();
                tokio::spawn(async move { child.invoke(child_state, child_ctx).await })
            })
            .collect();

        // Join every child before inspecting any result, so a failing branch
        // never races sibling writes past the parent.
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await.map_err(|error| {
                AgentFlowError::execution(format!(
                    "parallel agent '{}' task join failed: {error}",
                    self.name
                ))
            })?);
        }

        // First error in declaration order wins, even when a lower-index
        // sibling suspended: a failing child fails the whole agent, so its
        // siblings' outcomes are discarded.
        let mut completed = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            completed.push(outcome?);
        }

        let mut branch_states = Vec::with_capacity(completed.len());
        for (index, outcome) in completed.into_iter().enumerate() {
            match outcome {
                AgentOutcome::Complete(branch) => branch_states.push(branch),
                AgentOutcome::Interrupted(mut metadata) => {
                    metadata.push_frame(ResumeFrame::Parallel { index });
                    return Ok(AgentOutcome::Interrupted(metadata));
                }
            }
        }

        self.merge_branches(&mut state, &branch_states)?;
        hook::run_after_agent(&self.hooks, &mut state, &ctx.config).await?;
        Ok(AgentOutcome::Complete(state))
    }

    fn merge_branches(&self, state: &mut StateStore, branches: &[StateStore]) -> Result<()> {
        match &self.merge {
            ParallelMergeStrategy::CollectList { merge_key } => {
                let mut items = Vec::with_capacity(branches.len());
                for (child, branch) in self.children.iter().zip(branches) {
                    if branch.dirty_keys().contains(merge_key) {
                        return Err(AgentFlowError::execution(format!(
                            "parallel child '{}' wrote merge key '{merge_key}' directly",
                            child.name()
                        )));
                    }
                    match child.output_key().and_then(|key| branch.get(key)) {
                        Some(value) => items.push(value.clone()),
                        None => tracing::debug!(
                            parent = %self.name,
                            child = child.name(),
                            "child produced no output for list merge"
                        ),
                    }
                }
                state.put(merge_key.clone(), serde_json::Value::Array(items))?;
            }
            ParallelMergeStrategy::MergeDeltas => {
                for branch in branches {
                    state.apply_delta(&branch.delta())?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ParallelAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelAgent")
            .field("name", &self.name)
            .field("children", &self.children.len())
            .field("merge", &self.merge)
            .finish()
    }
}

/// Builder for [`ParallelAgent`]. Requires a name and at least one child;
/// the merge strategy defaults to [`ParallelMergeStrategy::MergeDeltas`].
#[derive(Default)]
pub struct ParallelAgentBuilder {
    name: Option<String>,
    children: Vec<Agent>,
    merge: Option<ParallelMergeStrategy>,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl ParallelAgentBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn agent(mut self, agent: Agent) -> Self {
        self.children.push(agent);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.children.extend(agents);
        self
    }

    pub fn merge_strategy(mut self, merge: ParallelMergeStrategy) -> Self {
        self.merge = Some(merge);
        self
    }

    /// Shorthand for [`ParallelMergeStrategy::CollectList`].
    pub fn collect_into(mut self, merge_key: impl Into<String>) -> Self {
        self.merge = Some(ParallelMergeStrategy::CollectList {
            merge_key: merge_key.into(),
        });
        self
    }

    pub fn hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<ParallelAgent> {
        let name = self
            .name
            .ok_or_else(|| AgentFlowError::compilation("parallel agent requires a name"))?;
        if self.children.is_empty() {
            return Err(AgentFlowError::compilation(format!(
                "parallel agent '{name}' has no children"
            )));
        }
        Ok(ParallelAgent {
            name,
            children: self.children,
            merge: self.merge.unwrap_or(ParallelMergeStrategy::MergeDeltas),
            hooks: self.hooks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_empty_children() {
        let err = ParallelAgent::builder().name("fanout").build().unwrap_err();
        assert!(matches!(err, AgentFlowError::Compilation(_)));
    }
}
