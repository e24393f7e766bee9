//! Loop agent: repeats a single child
//!
//! Two termination modes:
//!
//! - [`LoopMode::Count`] runs the child exactly `n` times, regardless of
//!   state.
//! - [`LoopMode::Condition`] evaluates a predicate against the overall state
//!   after each iteration and stops when it returns `true`. Condition loops
//!   are bounded by the compiled graph's `max_loops`; exceeding the bound is
//!   a fatal execution error, not a quiet stop.
//!
//! State flows through iterations: iteration `i+1` sees everything iteration
//! `i` wrote, so an `Append`-keyed output accumulates round by round. An
//! interruption inside iteration `i` suspends the whole loop there; resume
//! replays from iteration `i`, not from the start.

use std::fmt;
use std::sync::Arc;

use crate::agent::{Agent, AgentOutcome, ExecutionContext};
use crate::error::{AgentFlowError, Result};
use crate::hook::{self, AgentHook};
use crate::interruption::ResumeFrame;
use crate::state::StateStore;

/// Predicate over state; returning `true` stops a condition loop.
pub type LoopPredicate = Arc<dyn Fn(&StateStore) -> bool + Send + Sync>;

/// Termination policy for a [`LoopAgent`].
#[derive(Clone)]
pub enum LoopMode {
    /// Run the child exactly this many times
    Count(usize),
    /// Run until the predicate returns `true`, bounded by `max_loops`
    Condition(LoopPredicate),
}

impl LoopMode {
    /// Build a condition mode from a closure.
    pub fn condition<F>(predicate: F) -> Self
    where
        F: Fn(&StateStore) -> bool + Send + Sync + 'static,
    {
        Self::Condition(Arc::new(predicate))
    }
}

impl fmt::Debug for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => f.debug_tuple("Count").field(n).finish(),
            Self::Condition(_) => f.write_str("Condition(..)"),
        }
    }
}

/// Repeats its child according to a [`LoopMode`].
#[derive(Clone)]
pub struct LoopAgent {
    name: String,
    child: Box<Agent>,
    mode: LoopMode,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl LoopAgent {
    pub fn builder() -> LoopAgentBuilder {
        LoopAgentBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn child(&self) -> &Agent {
        &self.child
    }

    pub fn mode(&self) -> &LoopMode {
        &self.mode
    }

    pub(crate) async fn invoke(
        &self,
        mut state: StateStore,
        ctx: &ExecutionContext,
    ) -> Result<AgentOutcome> {
        let (start, resuming) = match (&ctx.resume, ctx.current_frame()) {
            (None, _) => (0, false),
            (Some(_), Some(ResumeFrame::Loop { iteration })) => (*iteration, true),
            (Some(_), Some(other)) => {
                return Err(AgentFlowError::interruption_protocol(format!(
                    "loop agent '{}' cannot resume from frame {other:?}",
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

        if !resuming {
            hook::run_before_agent(&self.hooks, &mut state, &ctx.config).await?;
        }

        let mut iteration = start;
        loop {
            match &self.mode {
                LoopMode::Count(n) => {
                    if iteration >= *n {
                        break;
                    }
                }
                LoopMode::Condition(_) => {
                    if iteration >= ctx.max_loops {
                        return Err(AgentFlowError::execution(format!(
                            "loop agent '{}' exceeded safety bound of {} iterations",
                            self.name, ctx.max_loops
                        )));
                    }
                }
            }

            let child_ctx = if resuming && iteration == start {
                ctx.descend()
            } else {
                ctx.without_resume()
            };
            tracing::debug!(agent = %self.name, iteration, "loop iteration");
            match self.child.invoke(state, child_ctx).await? {
                AgentOutcome::Complete(next) => state = next,
                AgentOutcome::Interrupted(mut metadata) => {
                    metadata.push_frame(ResumeFrame::Loop { iteration });
                    return Ok(AgentOutcome::Interrupted(metadata));
                }
            }

            iteration += 1;
            if let LoopMode::Condition(predicate) = &self.mode {
                if predicate(&state) {
                    break;
                }
            }
        }

        hook::run_after_agent(&self.hooks, &mut state, &ctx.config).await?;
        Ok(AgentOutcome::Complete(state))
    }
}

impl fmt::Debug for LoopAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopAgent")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Builder for [`LoopAgent`]. Requires a name, a child, and a mode.
#[derive(Default)]
pub struct LoopAgentBuilder {
    name: Option<String>,
    child: Option<Agent>,
    mode: Option<LoopMode>,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl LoopAgentBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn agent(mut self, agent: Agent) -> Self {
        self.child = Some(agent);
        self
    }

    pub fn mode(mut self, mode: LoopMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Shorthand for [`LoopMode::Count`].
    pub fn count(mut self, n: usize) -> Self {
        self.mode = Some(LoopMode::Count(n));
        self
    }

    /// Shorthand for [`LoopMode::condition`].
    pub fn until<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StateStore) -> bool + Send + Sync + 'static,
    {
        self.mode = Some(LoopMode::condition(predicate));
        self
    }

    pub fn hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<LoopAgent> {
        let name = self
            .name
            .ok_or_else(|| AgentFlowError::compilation("loop agent requires a name"))?;
        let child = self.child.ok_or_else(|| {
            AgentFlowError::compilation(format!("loop agent '{name}' requires a child"))
        })?;
        let mode = self.mode.ok_or_else(|| {
            AgentFlowError::compilation(format!("loop agent '{name}' requires a loop mode"))
        })?;
        if let LoopMode::Count(0) = mode {
            return Err(AgentFlowError::compilation(format!(
                "loop agent '{name}' has a zero iteration count"
            )));
        }
        Ok(LoopAgent {
            name,
            child: Box::new(child),
            mode,
            hooks: self.hooks,
        })
    }
}
