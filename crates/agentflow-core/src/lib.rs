//! # agentflow-core
//!
//! A composable agent execution engine: build a tree of agents that share a
//! typed key/value state, compile it into an executable graph, and invoke it.
//! Leaf agents run a model/tool loop; composite agents arrange children
//! sequentially, concurrently, or in a loop. Tool calls can be gated behind
//! external approval, suspending the run into a durable checkpoint that a
//! later invocation resumes.
//!
//! ## Building Blocks
//!
//! - [`StateStore`]: shared state with per-key merge strategies
//!   ([`ReplaceStrategy`], [`AppendStrategy`], [`FnStrategy`])
//! - [`LeafAgent`]: the atomic unit - a [`ChatModel`] plus [`Tool`]s driven
//!   in a bounded react loop
//! - [`SequentialAgent`], [`ParallelAgent`], [`LoopAgent`]: composition
//! - [`AgentHook`] / [`ModelInterceptor`] / [`ToolInterceptor`]: observation
//!   and middleware around execution
//! - [`CompiledGraph`]: validation, execution, suspend/resume, introspection
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentflow_core::{
//!     Agent, CompileConfig, LeafAgent, RunnableConfig, SequentialAgent,
//! };
//! use agentflow_checkpoint::MemorySaver;
//! use std::sync::Arc;
//!
//! let researcher = LeafAgent::builder()
//!     .name("researcher")
//!     .instruction("Research the user's question.")
//!     .model(model.clone())
//!     .tool(search_tool)
//!     .output_key("findings")
//!     .build()?;
//!
//! let writer = LeafAgent::builder()
//!     .name("writer")
//!     .instruction("Write a report from the findings.")
//!     .model(model)
//!     .output_key("report")
//!     .build()?;
//!
//! let graph = Agent::Sequential(
//!     SequentialAgent::builder()
//!         .name("pipeline")
//!         .agent(Agent::Leaf(researcher))
//!         .agent(Agent::Leaf(writer))
//!         .build()?,
//! )
//! .compile(CompileConfig::new().with_saver(Arc::new(MemorySaver::new())))?;
//!
//! let config = RunnableConfig::builder().thread_id("session-1").build();
//! let outcome = graph.invoke("What is Rust?".into(), config).await?;
//! ```
//!
//! ## Suspend and Resume
//!
//! Gate a tool with [`LeafAgentBuilder::approval_on`]; when the model
//! requests it the invocation returns
//! [`AgentOutcome::Interrupted`] carrying an [`InterruptionMetadata`] with
//! one pending [`ToolFeedback`] per gated call. Record a decision on each
//! (approve, edit, or reject), attach the decided metadata to a new
//! [`RunnableConfig`] via
//! [`RunnableConfigBuilder::human_feedback`], and re-invoke with the same
//! thread id - execution replays from the suspension point.

pub mod agent;
pub mod config;
pub mod error;
pub mod graph;
pub mod hook;
pub mod interceptor;
pub mod interruption;
pub mod messages;
pub mod model;
pub mod state;
pub mod tool;

pub use agent::{
    Agent, AgentOutcome, Instruction, LeafAgent, LeafAgentBuilder, LoopAgent, LoopAgentBuilder,
    LoopMode, LoopPredicate, ParallelAgent, ParallelAgentBuilder, ParallelMergeStrategy,
    SequentialAgent, SequentialAgentBuilder,
};
pub use config::{
    CompileConfig, LifecycleListener, RunnableConfig, RunnableConfigBuilder,
    DEFAULT_MAX_LOOPS, HUMAN_FEEDBACK_METADATA_KEY,
};
pub use error::{AgentFlowError, Result};
pub use graph::CompiledGraph;
pub use hook::AgentHook;
pub use interceptor::{
    ModelCallHandler, ModelInterceptor, ToolCallHandler, ToolCallRequest, ToolInterceptor,
};
pub use interruption::{
    FeedbackResult, InterruptionMetadata, InterruptionMetadataBuilder, ResumeFrame, ToolFeedback,
};
pub use messages::{Message, MessageRole, ToolCall};
pub use model::{ChatModel, ModelRequest, ModelResponse, Usage};
pub use state::{
    AppendStrategy, FnStrategy, KeyStrategy, ReplaceStrategy, StateDelta, StateError, StateStore,
};
pub use tool::{FnTool, Tool, ToolDefinition};
