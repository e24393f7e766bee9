//! Agent kinds and the shared execution machinery
//!
//! An [`Agent`] is a tree: leaves run a model/tool loop, composites arrange
//! children sequentially, concurrently, or in a loop. Every kind exposes the
//! same invocation contract - take a [`StateStore`], return an
//! [`AgentOutcome`] that is either a terminal state or an interruption
//! awaiting external feedback.
//!
//! Invocation recurses through [`Agent::invoke`], which boxes the future so
//! composite agents can contain arbitrary subtrees. Resume information rides
//! in the [`ExecutionContext`]: composites consume one [`ResumeFrame`] each
//! to fast-forward to the suspended position, and the targeted leaf consumes
//! the decided feedback.

mod leaf;
mod loops;
mod parallel;
mod sequential;

pub use leaf::{Instruction, LeafAgent, LeafAgentBuilder};
pub(crate) use leaf::DEFAULT_MESSAGES_KEY;
pub use loops::{LoopAgent, LoopAgentBuilder, LoopMode, LoopPredicate};
pub use parallel::{ParallelAgent, ParallelAgentBuilder, ParallelMergeStrategy};
pub use sequential::{SequentialAgent, SequentialAgentBuilder};

use futures::future::BoxFuture;
use std::sync::Arc;

use agentflow_checkpoint::{Checkpoint, CheckpointSaver};

use crate::config::{LifecycleListener, RunnableConfig};
use crate::error::{AgentFlowError, Result};
use crate::interruption::{InterruptionMetadata, ResumeFrame, ToolFeedback};
use crate::state::StateStore;

/// Result of invoking an agent: either a terminal state or a suspension
/// awaiting external feedback.
#[derive(Debug)]
pub enum AgentOutcome {
    /// The agent ran to completion
    Complete(StateStore),
    /// A gated tool call suspended execution
    Interrupted(InterruptionMetadata),
}

impl AgentOutcome {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    /// The terminal state, if the run completed.
    pub fn into_state(self) -> Option<StateStore> {
        match self {
            Self::Complete(state) => Some(state),
            Self::Interrupted(_) => None,
        }
    }

    /// The interruption record, if the run suspended.
    pub fn into_interruption(self) -> Option<InterruptionMetadata> {
        match self {
            Self::Complete(_) => None,
            Self::Interrupted(metadata) => Some(metadata),
        }
    }
}

/// A node in the agent tree.
#[derive(Clone)]
pub enum Agent {
    Leaf(LeafAgent),
    Sequential(SequentialAgent),
    Parallel(ParallelAgent),
    Loop(LoopAgent),
}

impl Agent {
    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(a) => a.name(),
            Self::Sequential(a) => a.name(),
            Self::Parallel(a) => a.name(),
            Self::Loop(a) => a.name(),
        }
    }

    /// Kind label used in logs and graph descriptions.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Leaf(_) => "leaf",
            Self::Sequential(_) => "sequential",
            Self::Parallel(_) => "parallel",
            Self::Loop(_) => "loop",
        }
    }

    /// Direct children, empty for leaves.
    pub fn children(&self) -> &[Agent] {
        match self {
            Self::Leaf(_) => &[],
            Self::Sequential(a) => a.children(),
            Self::Parallel(a) => a.children(),
            Self::Loop(a) => std::slice::from_ref(a.child()),
        }
    }

    /// The key this agent's final output lands under, when it has one.
    pub(crate) fn output_key(&self) -> Option<&str> {
        match self {
            Self::Leaf(a) => a.output_key(),
            Self::Parallel(a) => a.merge_output_key(),
            Self::Sequential(_) | Self::Loop(_) => None,
        }
    }

    /// Run this agent. Boxed so composites can recurse.
    pub(crate) fn invoke<'a>(
        &'a self,
        state: StateStore,
        ctx: ExecutionContext,
    ) -> BoxFuture<'a, Result<AgentOutcome>> {
        Box::pin(async move {
            ctx.notify_before(self.name(), &state);
            tracing::debug!(agent = self.name(), kind = self.kind(), "invoking");

            let result = match self {
                Self::Leaf(a) => a.invoke(state, &ctx).await,
                Self::Sequential(a) => a.invoke(state, &ctx).await,
                Self::Parallel(a) => a.invoke(state, &ctx).await,
                Self::Loop(a) => a.invoke(state, &ctx).await,
            };

            match &result {
                Ok(AgentOutcome::Complete(state)) => ctx.notify_after(self.name(), state),
                Ok(AgentOutcome::Interrupted(metadata)) => {
                    tracing::info!(
                        agent = self.name(),
                        pending = metadata.tool_feedbacks.len(),
                        "suspended for external feedback"
                    );
                }
                Err(error) => ctx.notify_error(self.name(), error),
            }
            result
        })
    }
}

/// Resume bookkeeping carried by the [`ExecutionContext`] when an invocation
/// replays a suspended run.
#[derive(Clone)]
pub(crate) struct ResumeState {
    /// Path to the suspension point from the stored checkpoint, root-first
    frames: Vec<ResumeFrame>,
    /// How many frames enclosing composites have consumed
    cursor: usize,
    /// Name of the leaf that suspended
    node: String,
    /// Caller's decided feedback
    feedbacks: Vec<ToolFeedback>,
    /// The stored interruption, re-persisted after each applied feedback
    stored: Arc<InterruptionMetadata>,
}

impl ResumeState {
    pub(crate) fn new(stored: InterruptionMetadata, feedbacks: Vec<ToolFeedback>) -> Self {
        Self {
            frames: stored.path.clone(),
            cursor: 0,
            node: stored.node.clone(),
            feedbacks,
            stored: Arc::new(stored),
        }
    }

    fn current_frame(&self) -> Option<&ResumeFrame> {
        self.frames.get(self.cursor)
    }

    /// Feedbacks decided by the caller for the suspended leaf.
    pub(crate) fn feedbacks(&self) -> &[ToolFeedback] {
        &self.feedbacks
    }
}

/// Everything an agent needs besides the state: per-run config, compiled
/// collaborators, and resume bookkeeping.
#[derive(Clone)]
pub(crate) struct ExecutionContext {
    pub(crate) config: Arc<RunnableConfig>,
    pub(crate) saver: Option<Arc<dyn CheckpointSaver>>,
    pub(crate) listener: Option<Arc<dyn LifecycleListener>>,
    pub(crate) max_loops: usize,
    pub(crate) resume: Option<ResumeState>,
}

impl ExecutionContext {
    /// The resume frame addressed to the current composite, if resuming.
    pub(crate) fn current_frame(&self) -> Option<&ResumeFrame> {
        self.resume.as_ref().and_then(ResumeState::current_frame)
    }

    pub(crate) fn is_resuming(&self) -> bool {
        self.resume.is_some()
    }

    /// Context for the child the resume path targets: same resume state with
    /// one more frame consumed.
    pub(crate) fn descend(&self) -> Self {
        let mut ctx = self.clone();
        if let Some(resume) = &mut ctx.resume {
            resume.cursor += 1;
        }
        ctx
    }

    /// Context for children outside the resume path.
    pub(crate) fn without_resume(&self) -> Self {
        let mut ctx = self.clone();
        ctx.resume = None;
        ctx
    }

    /// Validate and take the resume state for a leaf. Errors if the resume
    /// path does not terminate exactly at this leaf.
    pub(crate) fn leaf_resume(&self, leaf_name: &str) -> Result<Option<ResumeState>> {
        match &self.resume {
            None => Ok(None),
            Some(resume) => {
                if resume.current_frame().is_some() {
                    return Err(AgentFlowError::interruption_protocol(format!(
                        "resume path descends past leaf agent '{leaf_name}'"
                    )));
                }
                if resume.node != leaf_name {
                    return Err(AgentFlowError::interruption_protocol(format!(
                        "resume targets agent '{}' but reached '{leaf_name}'",
                        resume.node
                    )));
                }
                Ok(Some(resume.clone()))
            }
        }
    }

    /// Re-persist the suspended checkpoint with updated state. Called after
    /// each applied feedback so a crash mid-resume never replays a tool
    /// whose result is already recorded.
    pub(crate) async fn recheckpoint(&self, state: &StateStore) -> Result<()> {
        let (Some(saver), Some(thread_id), Some(resume)) = (
            self.saver.as_ref(),
            self.config.thread_id.as_deref(),
            self.resume.as_ref(),
        ) else {
            return Ok(());
        };
        let interruption = serde_json::to_value(resume.stored.as_ref())?;
        let checkpoint = Checkpoint::new(thread_id, state.values().clone(), Some(interruption));
        saver.save(thread_id, checkpoint).await?;
        Ok(())
    }

    pub(crate) fn notify_before(&self, node: &str, state: &StateStore) {
        if let Some(listener) = &self.listener {
            listener.before_node(node, state);
        }
    }

    pub(crate) fn notify_after(&self, node: &str, state: &StateStore) {
        if let Some(listener) = &self.listener {
            listener.after_node(node, state);
        }
    }

    pub(crate) fn notify_error(&self, node: &str, error: &AgentFlowError) {
        tracing::error!(agent = node, %error, "agent failed");
        if let Some(listener) = &self.listener {
            listener.on_error(node, error);
        }
    }
}
