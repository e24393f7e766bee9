//! Tool abstraction for leaf agents
//!
//! A [`Tool`] is an async callable the model can request by name. Leaf agents
//! advertise their tools' [`ToolDefinition`]s on every model request and
//! dispatch the returned tool calls through the tool interceptor chain.
//!
//! [`FnTool`] wraps a plain closure for quick definitions and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Schema advertised to the model for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema for the arguments object
    pub input_schema: Value,
}

/// An async callable the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the arguments object. Defaults to an unconstrained
    /// object.
    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    /// Execute the tool with the given arguments.
    async fn invoke(&self, arguments: Value) -> Result<Value>;

    /// The definition advertised to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A tool backed by a synchronous closure.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    input_schema: Value,
    handler: Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: json!({"type": "object"}),
            handler: Arc::new(handler),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_tool_invokes_handler() {
        let tool = FnTool::new("echo", "echoes its arguments", |args| Ok(args));
        let result = tool.invoke(json!({"text": "hi"})).await.unwrap();
        assert_eq!(result, json!({"text": "hi"}));
    }

    #[test]
    fn test_definition_defaults() {
        let tool = FnTool::new("echo", "echoes its arguments", Ok);
        let def = tool.definition();
        assert_eq!(def.name, "echo");
        assert_eq!(def.input_schema, json!({"type": "object"}));

        let tool = tool.with_input_schema(json!({
            "type": "object",
            "properties": {"text": {"type": "string"}}
        }));
        assert_eq!(
            tool.definition().input_schema["properties"]["text"]["type"],
            json!("string")
        );
    }
}
