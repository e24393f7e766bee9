//! Shared fixtures: a scripted model and a call-counting tool.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentflow_core::{
    AgentFlowError, ChatModel, ModelRequest, ModelResponse, Result, Tool,
};

/// Replays a fixed sequence of responses, optionally delaying each call.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_delay(responses: Vec<ModelResponse>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn call(&self, _request: ModelRequest) -> Result<ModelResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentFlowError::execution("model script exhausted"))
    }
}

/// Records invocations and returns a fixed result.
pub struct CountingTool {
    name: String,
    result: Value,
    calls: AtomicUsize,
    last_arguments: Mutex<Option<Value>>,
}

impl CountingTool {
    pub fn new(name: impl Into<String>, result: Value) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            result,
            calls: AtomicUsize::new(0),
            last_arguments: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_arguments(&self) -> Option<Value> {
        self.last_arguments.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "test tool"
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_arguments.lock().unwrap() = Some(arguments);
        Ok(self.result.clone())
    }
}
