//! Hook pipeline for observing and amending agent execution
//!
//! Hooks run at four positions around a leaf agent's work: before the agent
//! starts, before and after each model call, and after the agent finishes.
//! Each callback may return a [`StateDelta`], which is applied to the shared
//! state through the normal merge strategies before the next hook runs, so a
//! later hook observes the effects of an earlier one.
//!
//! All callbacks have default no-op implementations; implement only the
//! positions you need.

use async_trait::async_trait;

use crate::config::RunnableConfig;
use crate::error::Result;
use crate::model::{ModelRequest, ModelResponse};
use crate::state::{StateDelta, StateStore};

/// Observer/mutator callbacks around agent execution.
#[async_trait]
pub trait AgentHook: Send + Sync {
    /// Identifies the hook in logs.
    fn name(&self) -> &str;

    /// Runs once when the agent starts, before the first model call.
    async fn before_agent(
        &self,
        state: &StateStore,
        config: &RunnableConfig,
    ) -> Result<Option<StateDelta>> {
        let _ = (state, config);
        Ok(None)
    }

    /// Runs before each model call with the request about to be sent.
    async fn before_model(
        &self,
        request: &ModelRequest,
        state: &StateStore,
        config: &RunnableConfig,
    ) -> Result<Option<StateDelta>> {
        let _ = (request, state, config);
        Ok(None)
    }

    /// Runs after a model call that produced a terminal (no tool calls)
    /// response.
    async fn after_model(
        &self,
        response: &ModelResponse,
        state: &StateStore,
        config: &RunnableConfig,
    ) -> Result<Option<StateDelta>> {
        let _ = (response, state, config);
        Ok(None)
    }

    /// Runs once when the agent completes.
    async fn after_agent(
        &self,
        state: &StateStore,
        config: &RunnableConfig,
    ) -> Result<Option<StateDelta>> {
        let _ = (state, config);
        Ok(None)
    }
}

pub(crate) async fn run_before_agent(
    hooks: &[std::sync::Arc<dyn AgentHook>],
    state: &mut StateStore,
    config: &RunnableConfig,
) -> Result<()> {
    for hook in hooks {
        if let Some(delta) = hook.before_agent(state, config).await? {
            tracing::debug!(hook = hook.name(), keys = delta.len(), "before_agent delta");
            state.apply_delta(&delta)?;
        }
    }
    Ok(())
}

pub(crate) async fn run_before_model(
    hooks: &[std::sync::Arc<dyn AgentHook>],
    request: &ModelRequest,
    state: &mut StateStore,
    config: &RunnableConfig,
) -> Result<()> {
    for hook in hooks {
        if let Some(delta) = hook.before_model(request, state, config).await? {
            state.apply_delta(&delta)?;
        }
    }
    Ok(())
}

pub(crate) async fn run_after_model(
    hooks: &[std::sync::Arc<dyn AgentHook>],
    response: &ModelResponse,
    state: &mut StateStore,
    config: &RunnableConfig,
) -> Result<()> {
    for hook in hooks {
        if let Some(delta) = hook.after_model(response, state, config).await? {
            state.apply_delta(&delta)?;
        }
    }
    Ok(())
}

pub(crate) async fn run_after_agent(
    hooks: &[std::sync::Arc<dyn AgentHook>],
    state: &mut StateStore,
    config: &RunnableConfig,
) -> Result<()> {
    for hook in hooks {
        if let Some(delta) = hook.after_agent(state, config).await? {
            state.apply_delta(&delta)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    struct TagHook {
        name: &'static str,
    }

    #[async_trait]
    impl AgentHook for TagHook {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_agent(
            &self,
            state: &StateStore,
            _config: &RunnableConfig,
        ) -> Result<Option<StateDelta>> {
            // Appends its own name so ordering is observable.
            let mut seen: Vec<String> = state.get_as("seen").unwrap().unwrap_or_default();
            seen.push(self.name.to_string());
            let mut delta = StateDelta::new();
            delta.insert("seen".to_string(), json!(seen));
            Ok(Some(delta))
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_and_see_prior_deltas() {
        let hooks: Vec<Arc<dyn AgentHook>> = vec![
            Arc::new(TagHook { name: "first" }),
            Arc::new(TagHook { name: "second" }),
        ];
        let mut state = StateStore::new();
        let config = RunnableConfig::default();

        run_before_agent(&hooks, &mut state, &config).await.unwrap();

        assert_eq!(state.get("seen"), Some(&json!(["first", "second"])));
    }
}
