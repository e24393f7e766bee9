//! Sequential agent: children run in declaration order
//!
//! Each child receives the state produced by the previous one. An
//! interruption from a child propagates immediately, tagged with the child's
//! index so resume can fast-forward to it.

use std::sync::Arc;

use crate::agent::{Agent, AgentOutcome, ExecutionContext};
use crate::error::{AgentFlowError, Result};
use crate::hook::{self, AgentHook};
use crate::interruption::ResumeFrame;
use crate::state::StateStore;

/// Runs its children one after another, threading state through.
#[derive(Clone)]
pub struct SequentialAgent {
    name: String,
    children: Vec<Agent>,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl SequentialAgent {
    pub fn builder() -> SequentialAgentBuilder {
        SequentialAgentBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Agent] {
        &self.children
    }

    pub(crate) async fn invoke(
        &self,
        mut state: StateStore,
        ctx: &ExecutionContext,
    ) -> Result<AgentOutcome> {
        let (start, resuming) = match (&ctx.resume, ctx.current_frame()) {
            (None, _) => (0, false),
            (Some(_), Some(ResumeFrame::Sequential { index })) => (*index, true),
            (Some(_), Some(other)) => {
                return Err(AgentFlowError::interruption_protocol(format!(
                    "sequential agent '{}' cannot resume from frame {other:?}",
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
        if start >= self.children.len() {
            return Err(AgentFlowError::interruption_protocol(format!(
                "resume index {start} out of range for sequential agent '{}'",
                self.name
            )));
        }

        if !resuming {
            hook::run_before_agent(&self.hooks, &mut state, &ctx.config).await?;
        }

        for (index, child) in self.children.iter().enumerate().skip(start) {
            let child_ctx = if resuming && index == start {
                ctx.descend()
            } else {
                ctx.without_resume()
            };
            match child.invoke(state, child_ctx).await? {
                AgentOutcome::Complete(next) => state = next,
                AgentOutcome::Interrupted(mut metadata) => {
                    metadata.push_frame(ResumeFrame::Sequential { index });
                    return Ok(AgentOutcome::Interrupted(metadata));
                }
            }
        }

        hook::run_after_agent(&self.hooks, &mut state, &ctx.config).await?;
        Ok(AgentOutcome::Complete(state))
    }
}

impl std::fmt::Debug for SequentialAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialAgent")
            .field("name", &self.name)
            .field("children", &self.children.len())
            .finish()
    }
}

/// Builder for [`SequentialAgent`]. Requires a name and at least one child.
#[derive(Default)]
pub struct SequentialAgentBuilder {
    name: Option<String>,
    children: Vec<Agent>,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl SequentialAgentBuilder {
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

    pub fn hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<SequentialAgent> {
        let name = self
            .name
            .ok_or_else(|| AgentFlowError::compilation("sequential agent requires a name"))?;
        if self.children.is_empty() {
            return Err(AgentFlowError::compilation(format!(
                "sequential agent '{name}' has no children"
            )));
        }
        Ok(SequentialAgent {
            name,
            children: self.children,
            hooks: self.hooks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_empty_children() {
        let err = SequentialAgent::builder().name("pipeline").build().unwrap_err();
        assert!(matches!(err, AgentFlowError::Compilation(_)));
    }
}
