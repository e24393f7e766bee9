//! Chat model abstraction
//!
//! [`ChatModel`] is the single seam between the engine and any LLM provider.
//! Leaf agents build a [`ModelRequest`] (system instruction + history + tool
//! definitions), run it through their interceptor chain, and the chain's
//! terminal step calls the model. Implement the trait over your provider's
//! client; tests implement it with scripted responses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::messages::{Message, ToolCall};
use crate::tool::ToolDefinition;

/// A fully assembled request for one model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Conversation so far, system instruction first
    pub messages: Vec<Message>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// JSON schema the final answer must conform to, if structured output
    /// was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl ModelRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            output_schema: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_output_schema(mut self, schema: Option<Value>) -> Self {
        self.output_schema = schema;
        self
    }
}

/// Token accounting reported by a provider, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The model's reply to a [`ModelRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The assistant message, possibly carrying tool calls
    pub message: Message,

    /// Token usage, if the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ModelResponse {
    /// A plain text reply with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            usage: None,
        }
    }

    /// A reply requesting tool calls.
    pub fn with_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            message: Message::assistant_with_tool_calls(content, calls),
            usage: None,
        }
    }

    /// Tool calls in the reply, empty if none.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message.tool_calls()
    }
}

/// Provider-agnostic chat model interface.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one chat completion.
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = ModelRequest::new(vec![Message::user("hi")])
            .with_tools(vec![ToolDefinition {
                name: "search".to_string(),
                description: "web search".to_string(),
                input_schema: json!({"type": "object"}),
            }])
            .with_output_schema(Some(json!({"type": "object"})));

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.tools[0].name, "search");
        assert!(request.output_schema.is_some());
    }

    #[test]
    fn test_response_tool_calls_default_empty() {
        assert!(ModelResponse::text("done").tool_calls().is_empty());

        let response =
            ModelResponse::with_tool_calls("", vec![ToolCall::new("search", json!({}))]);
        assert_eq!(response.tool_calls().len(), 1);
    }
}
