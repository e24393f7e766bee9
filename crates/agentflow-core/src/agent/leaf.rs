//! Leaf agent: the reactive model/tool loop
//!
//! A leaf agent owns a chat model, a set of tools, and an instruction. Each
//! invocation runs a bounded loop: build a request from the instruction plus
//! accumulated history, call the model through the interceptor chain, execute
//! any requested tools, and feed results back until the model answers without
//! tool calls. The final content is written to the agent's output key.
//!
//! Tools named in an approval gate are never executed directly: when the
//! model requests one, the agent suspends and returns an
//! [`InterruptionMetadata`](crate::interruption::InterruptionMetadata) with a
//! pending feedback per gated call. On resume the decided feedback is applied
//! (invoke, invoke with edited arguments, or synthesize a rejection result)
//! and the loop continues.
//!
//! Feedback application is idempotent: a feedback whose tool-result message
//! is already in history is skipped, so re-resuming with the same decisions
//! never re-runs a tool.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::agent::{AgentOutcome, ExecutionContext, ResumeState};
use crate::error::{AgentFlowError, Result};
use crate::hook::{self, AgentHook};
use crate::interceptor::{
    ModelCallHandler, ModelInterceptor, ToolCallHandler, ToolCallRequest, ToolInterceptor,
};
use crate::interruption::{FeedbackResult, InterruptionMetadata, ToolFeedback};
use crate::messages::{Message, ToolCall};
use crate::model::{ChatModel, ModelRequest, ModelResponse};
use crate::state::{AppendStrategy, KeyStrategy, ReplaceStrategy, StateStore};
use crate::tool::Tool;

/// Default bound on model-call iterations per invocation.
pub(crate) const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default state key for an agent's message history.
pub(crate) const DEFAULT_MESSAGES_KEY: &str = "messages";

/// The system instruction for a leaf agent, static or computed from state.
#[derive(Clone)]
pub enum Instruction {
    Static(String),
    Computed(Arc<dyn Fn(&StateStore) -> String + Send + Sync>),
}

impl Instruction {
    pub(crate) fn render(&self, state: &StateStore) -> String {
        match self {
            Self::Static(text) => text.clone(),
            Self::Computed(f) => f(state),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// An agent that runs a model/tool loop against the shared state.
#[derive(Clone)]
pub struct LeafAgent {
    name: String,
    instruction: Instruction,
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    hooks: Vec<Arc<dyn AgentHook>>,
    interceptors: Vec<Arc<dyn ModelInterceptor>>,
    tool_interceptors: Vec<Arc<dyn ToolInterceptor>>,
    /// Tool name -> why it needs approval
    gates: BTreeMap<String, String>,
    output_key: Option<String>,
    output_strategy: Arc<dyn KeyStrategy>,
    output_schema: Option<Value>,
    messages_key: String,
    max_iterations: usize,
}

impl LeafAgent {
    pub fn builder() -> LeafAgentBuilder {
        LeafAgentBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    pub(crate) fn output_strategy(&self) -> Arc<dyn KeyStrategy> {
        Arc::clone(&self.output_strategy)
    }

    pub(crate) fn messages_key(&self) -> &str {
        &self.messages_key
    }

    pub(crate) async fn invoke(
        &self,
        mut state: StateStore,
        ctx: &ExecutionContext,
    ) -> Result<AgentOutcome> {
        let resume = ctx.leaf_resume(&self.name)?;

        state.register_strategy(self.messages_key.clone(), Arc::new(AppendStrategy));
        if let Some(key) = &self.output_key {
            state.register_strategy(key.clone(), Arc::clone(&self.output_strategy));
        }

        match &resume {
            Some(resume) => self.apply_feedbacks(&mut state, resume, ctx).await?,
            // before_agent ran before the original suspension, so only on
            // fresh invocations
            None => hook::run_before_agent(&self.hooks, &mut state, &ctx.config).await?,
        }

        for iteration in 0..self.max_iterations {
            let request = self.build_request(&state)?;
            hook::run_before_model(&self.hooks, &request, &mut state, &ctx.config).await?;

            tracing::debug!(agent = %self.name, iteration, "model call");
            let response = self.call_model(request).await?;

            state.put(
                self.messages_key.clone(),
                serde_json::to_value(std::slice::from_ref(&response.message))?,
            )?;

            let calls = response.tool_calls().to_vec();
            if calls.is_empty() {
                hook::run_after_model(&self.hooks, &response, &mut state, &ctx.config).await?;
                self.write_output(&mut state, &response.message.content)?;
                hook::run_after_agent(&self.hooks, &mut state, &ctx.config).await?;
                return Ok(AgentOutcome::Complete(state));
            }

            let (gated, ungated): (Vec<ToolCall>, Vec<ToolCall>) = calls
                .into_iter()
                .partition(|call| self.gates.contains_key(&call.name));

            // Non-gated calls run immediately, even alongside gated ones, so
            // their results are in the captured state when the run suspends.
            for call in &ungated {
                self.execute_tool(call, &mut state).await?;
            }

            if !gated.is_empty() {
                let mut builder = InterruptionMetadata::builder()
                    .node(self.name.clone())
                    .state(state.values().clone());
                for call in &gated {
                    let reason = self.gates[&call.name].clone();
                    builder = builder.add_tool_feedback(ToolFeedback::pending(call, reason));
                }
                return Ok(AgentOutcome::Interrupted(builder.build()));
            }
        }

        Err(AgentFlowError::node_execution(
            &self.name,
            format!("exceeded max_iterations ({})", self.max_iterations),
        ))
    }

    /// Apply the caller's decisions on previously gated tool calls. Skips any
    /// feedback whose tool result is already in history, then re-persists the
    /// checkpoint after each application.
    async fn apply_feedbacks(
        &self,
        state: &mut StateStore,
        resume: &ResumeState,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        for feedback in resume.feedbacks() {
            let already_applied = self
                .history(state)?
                .iter()
                .any(|message| message.answers_tool_call(&feedback.id));
            if already_applied {
                tracing::debug!(
                    agent = %self.name,
                    call_id = %feedback.id,
                    "feedback already applied, skipping"
                );
                continue;
            }

            match feedback.result {
                FeedbackResult::Pending => {
                    return Err(AgentFlowError::interruption_protocol(format!(
                        "tool call '{}' resumed without a decision",
                        feedback.id
                    )));
                }
                FeedbackResult::Approved | FeedbackResult::Edited => {
                    let call = ToolCall {
                        id: feedback.id.clone(),
                        name: feedback.name.clone(),
                        arguments: feedback.arguments.clone(),
                    };
                    self.execute_tool(&call, state).await?;
                }
                FeedbackResult::Rejected => {
                    let reason = feedback
                        .description
                        .clone()
                        .unwrap_or_else(|| "rejected by operator".to_string());
                    let result = Message::tool(
                        format!("Tool call rejected: {reason}"),
                        feedback.id.clone(),
                        feedback.name.clone(),
                    );
                    state.put(
                        self.messages_key.clone(),
                        serde_json::to_value(std::slice::from_ref(&result))?,
                    )?;
                }
            }

            ctx.recheckpoint(state).await?;
        }
        Ok(())
    }

    fn history(&self, state: &StateStore) -> Result<Vec<Message>> {
        Ok(state.get_as(&self.messages_key)?.unwrap_or_default())
    }

    fn build_request(&self, state: &StateStore) -> Result<ModelRequest> {
        let mut messages = vec![Message::system(self.instruction.render(state))];
        messages.extend(self.history(state)?);
        Ok(ModelRequest::new(messages)
            .with_tools(self.tools.iter().map(|tool| tool.definition()).collect())
            .with_output_schema(self.output_schema.clone()))
    }

    async fn call_model(&self, request: ModelRequest) -> Result<ModelResponse> {
        let model = &self.model;
        let terminal = move |request: ModelRequest| model.call(request);
        let handler = ModelCallHandler::new(&self.interceptors, &terminal);
        handler.call(request).await.map_err(|error| match error {
            typed @ AgentFlowError::ModelCall { .. } => typed,
            other => AgentFlowError::model_call(&self.name, other.to_string()),
        })
    }

    /// Run one tool call through the tool interceptor chain and append the
    /// result to history.
    async fn execute_tool(&self, call: &ToolCall, state: &mut StateStore) -> Result<()> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == call.name)
            .ok_or_else(|| AgentFlowError::tool_invocation(&call.name, "unknown tool"))?;

        let tool_ref = &**tool;
        let terminal = move |request: ToolCallRequest| tool_ref.invoke(request.arguments);
        let handler = ToolCallHandler::new(&self.tool_interceptors, &terminal);

        tracing::debug!(agent = %self.name, tool = %call.name, call_id = %call.id, "tool call");
        let result = handler
            .call(ToolCallRequest {
                tool: call.name.clone(),
                call_id: call.id.clone(),
                arguments: call.arguments.clone(),
            })
            .await
            .map_err(|error| match error {
                typed @ AgentFlowError::ToolInvocation { .. } => typed,
                other => AgentFlowError::tool_invocation(&call.name, other.to_string()),
            })?;

        let content = match result {
            Value::String(text) => text,
            other => other.to_string(),
        };
        let message = Message::tool(content, call.id.clone(), call.name.clone());
        state.put(
            self.messages_key.clone(),
            serde_json::to_value(std::slice::from_ref(&message))?,
        )?;
        Ok(())
    }

    fn write_output(&self, state: &mut StateStore, content: &str) -> Result<()> {
        let Some(key) = &self.output_key else {
            return Ok(());
        };
        let value = match &self.output_schema {
            Some(_) => serde_json::from_str(content).map_err(|error| {
                AgentFlowError::node_execution(
                    &self.name,
                    format!("structured output is not valid JSON: {error}"),
                )
            })?,
            None => Value::String(content.to_string()),
        };
        state.put(key.clone(), value)?;
        Ok(())
    }
}

impl fmt::Debug for LeafAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafAgent")
            .field("name", &self.name)
            .field("tools", &self.tools.len())
            .field("gates", &self.gates)
            .field("output_key", &self.output_key)
            .finish()
    }
}

/// Builder for [`LeafAgent`]. `name`, `instruction`, and `model` are
/// required.
#[derive(Default)]
pub struct LeafAgentBuilder {
    name: Option<String>,
    instruction: Option<Instruction>,
    model: Option<Arc<dyn ChatModel>>,
    tools: Vec<Arc<dyn Tool>>,
    hooks: Vec<Arc<dyn AgentHook>>,
    interceptors: Vec<Arc<dyn ModelInterceptor>>,
    tool_interceptors: Vec<Arc<dyn ToolInterceptor>>,
    gates: BTreeMap<String, String>,
    output_key: Option<String>,
    output_strategy: Option<Arc<dyn KeyStrategy>>,
    output_schema: Option<Value>,
    messages_key: Option<String>,
    max_iterations: Option<usize>,
}

impl LeafAgentBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Static system instruction.
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(Instruction::Static(instruction.into()));
        self
    }

    /// Instruction computed from state on every model call.
    pub fn instruction_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&StateStore) -> String + Send + Sync + 'static,
    {
        self.instruction = Some(Instruction::Computed(Arc::new(f)));
        self
    }

    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn ModelInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn tool_interceptor(mut self, interceptor: Arc<dyn ToolInterceptor>) -> Self {
        self.tool_interceptors.push(interceptor);
        self
    }

    /// Gate a tool behind external approval. When the model requests this
    /// tool, the run suspends instead of executing it.
    pub fn approval_on(mut self, tool: impl Into<String>, reason: impl Into<String>) -> Self {
        self.gates.insert(tool.into(), reason.into());
        self
    }

    /// Write the final content under this key with [`ReplaceStrategy`].
    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Write the final content under this key with a custom merge strategy.
    pub fn output_key_with_strategy(
        mut self,
        key: impl Into<String>,
        strategy: Arc<dyn KeyStrategy>,
    ) -> Self {
        self.output_key = Some(key.into());
        self.output_strategy = Some(strategy);
        self
    }

    /// Require the final content to parse as JSON conforming to this schema;
    /// the parsed value (not the raw string) is written to the output key.
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// State key for this agent's message history. Defaults to `"messages"`.
    pub fn messages_key(mut self, key: impl Into<String>) -> Self {
        self.messages_key = Some(key.into());
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn build(self) -> Result<LeafAgent> {
        let name = self
            .name
            .ok_or_else(|| AgentFlowError::compilation("leaf agent requires a name"))?;
        let instruction = self.instruction.ok_or_else(|| {
            AgentFlowError::compilation(format!("leaf agent '{name}' requires an instruction"))
        })?;
        let model = self.model.ok_or_else(|| {
            AgentFlowError::compilation(format!("leaf agent '{name}' requires a model"))
        })?;
        for gated in self.gates.keys() {
            if !self.tools.iter().any(|tool| tool.name() == gated) {
                return Err(AgentFlowError::compilation(format!(
                    "leaf agent '{name}' gates unknown tool '{gated}'"
                )));
            }
        }
        Ok(LeafAgent {
            name,
            instruction,
            model,
            tools: self.tools,
            hooks: self.hooks,
            interceptors: self.interceptors,
            tool_interceptors: self.tool_interceptors,
            gates: self.gates,
            output_key: self.output_key,
            output_strategy: self
                .output_strategy
                .unwrap_or_else(|| Arc::new(ReplaceStrategy)),
            output_schema: self.output_schema,
            messages_key: self
                .messages_key
                .unwrap_or_else(|| DEFAULT_MESSAGES_KEY.to_string()),
            max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_name_instruction_model() {
        let err = LeafAgent::builder().build().unwrap_err();
        assert!(matches!(err, AgentFlowError::Compilation(_)));

        let err = LeafAgent::builder().name("a").build().unwrap_err();
        assert!(err.to_string().contains("instruction"));
    }

    #[test]
    fn test_builder_rejects_gate_on_unknown_tool() {
        struct NoModel;
        #[async_trait::async_trait]
        impl ChatModel for NoModel {
            async fn call(&self, _request: ModelRequest) -> Result<ModelResponse> {
                Ok(ModelResponse::text(""))
            }
        }

        let err = LeafAgent::builder()
            .name("operator")
            .instruction("do things")
            .model(Arc::new(NoModel))
            .approval_on("delete_data", "destructive")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("delete_data"));
    }
}
