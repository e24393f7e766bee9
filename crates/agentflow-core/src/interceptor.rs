//! Interceptor chains around model and tool calls
//!
//! Interceptors wrap the *call itself*, onion-style: each one receives the
//! request plus a `next` handler and decides whether to forward (possibly
//! with a rewritten request), short-circuit with its own response, retry, or
//! translate errors. The innermost step of a chain is the real model or tool
//! invocation.
//!
//! ```rust,ignore
//! struct RetryOnce;
//!
//! #[async_trait]
//! impl ModelInterceptor for RetryOnce {
//!     fn name(&self) -> &str { "retry_once" }
//!
//!     async fn intercept_model(
//!         &self,
//!         request: ModelRequest,
//!         next: ModelCallHandler<'_>,
//!     ) -> Result<ModelResponse> {
//!         match next.clone().call(request.clone()).await {
//!             Ok(response) => Ok(response),
//!             Err(_) => next.call(request).await,
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{ModelRequest, ModelResponse};

/// Terminal step of a model interceptor chain.
pub type ModelCallFn<'a> =
    dyn Fn(ModelRequest) -> BoxFuture<'a, Result<ModelResponse>> + Send + Sync + 'a;

/// The remainder of a model interceptor chain.
///
/// Calling [`call`](Self::call) runs the next interceptor, or the real model
/// call once the chain is exhausted.
#[derive(Clone, Copy)]
pub struct ModelCallHandler<'a> {
    chain: &'a [Arc<dyn ModelInterceptor>],
    terminal: &'a ModelCallFn<'a>,
}

impl<'a> ModelCallHandler<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn ModelInterceptor>], terminal: &'a ModelCallFn<'a>) -> Self {
        Self { chain, terminal }
    }

    /// Forward the request to the rest of the chain.
    pub fn call(self, request: ModelRequest) -> BoxFuture<'a, Result<ModelResponse>> {
        Box::pin(async move {
            match self.chain.split_first() {
                Some((head, rest)) => {
                    let next = ModelCallHandler {
                        chain: rest,
                        terminal: self.terminal,
                    };
                    head.intercept_model(request, next).await
                }
                None => (self.terminal)(request).await,
            }
        })
    }
}

/// Wraps model calls made by a leaf agent.
#[async_trait]
pub trait ModelInterceptor: Send + Sync {
    /// Identifies the interceptor in logs.
    fn name(&self) -> &str;

    /// Handle one model call. Forward via `next.call(request)`, or
    /// short-circuit by returning a response without calling `next`.
    async fn intercept_model(
        &self,
        request: ModelRequest,
        next: ModelCallHandler<'_>,
    ) -> Result<ModelResponse>;
}

/// One tool call about to be executed.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Name of the tool being invoked
    pub tool: String,
    /// Correlation id of the originating tool call
    pub call_id: String,
    /// Arguments as a JSON object
    pub arguments: Value,
}

/// Terminal step of a tool interceptor chain.
pub type ToolCallFn<'a> =
    dyn Fn(ToolCallRequest) -> BoxFuture<'a, Result<Value>> + Send + Sync + 'a;

/// The remainder of a tool interceptor chain.
#[derive(Clone, Copy)]
pub struct ToolCallHandler<'a> {
    chain: &'a [Arc<dyn ToolInterceptor>],
    terminal: &'a ToolCallFn<'a>,
}

impl<'a> ToolCallHandler<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn ToolInterceptor>], terminal: &'a ToolCallFn<'a>) -> Self {
        Self { chain, terminal }
    }

    /// Forward the request to the rest of the chain.
    pub fn call(self, request: ToolCallRequest) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            match self.chain.split_first() {
                Some((head, rest)) => {
                    let next = ToolCallHandler {
                        chain: rest,
                        terminal: self.terminal,
                    };
                    head.intercept_tool(request, next).await
                }
                None => (self.terminal)(request).await,
            }
        })
    }
}

/// Wraps tool invocations made by a leaf agent.
#[async_trait]
pub trait ToolInterceptor: Send + Sync {
    /// Identifies the interceptor in logs.
    fn name(&self) -> &str;

    /// Handle one tool invocation. Forward via `next.call(request)`, or
    /// short-circuit by returning a result without calling `next`.
    async fn intercept_tool(
        &self,
        request: ToolCallRequest,
        next: ToolCallHandler<'_>,
    ) -> Result<Value>;
}
