//! Composition semantics: sequential threading, parallel merge order, and
//! loop termination.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use agentflow_core::{
    Agent, AgentFlowError, AgentOutcome, AppendStrategy, ChatModel, CompileConfig, LeafAgent,
    LoopAgent, ModelResponse, ParallelAgent, RunnableConfig, SequentialAgent, StateStore,
};
use common::ScriptedModel;

fn leaf_with(name: &str, output_key: &str, model: Arc<ScriptedModel>) -> Agent {
    Agent::Leaf(
        LeafAgent::builder()
            .name(name)
            .instruction("answer")
            .model(model)
            .output_key(output_key)
            .build()
            .unwrap(),
    )
}

async fn run(agent: Agent, input: Value) -> StateStore {
    let graph = agent.compile(CompileConfig::new()).unwrap();
    match graph.invoke(input, RunnableConfig::default()).await.unwrap() {
        AgentOutcome::Complete(state) => state,
        AgentOutcome::Interrupted(_) => panic!("unexpected interruption"),
    }
}

#[tokio::test]
async fn test_sequential_equals_function_composition() {
    let script_a = || vec![ModelResponse::text("findings")];
    let script_b = || vec![ModelResponse::text("report")];

    // One pass through Sequential(A, B).
    let composed = Agent::Sequential(
        SequentialAgent::builder()
            .name("pipeline")
            .agent(leaf_with("a", "a_out", ScriptedModel::new(script_a())))
            .agent(leaf_with("b", "b_out", ScriptedModel::new(script_b())))
            .build()
            .unwrap(),
    );
    let state_composed = run(composed, json!("start")).await;

    // A then B as separate invocations, threading state by hand.
    let state_a = run(
        leaf_with("a", "a_out", ScriptedModel::new(script_a())),
        json!("start"),
    )
    .await;
    let state_b = run(
        leaf_with("b", "b_out", ScriptedModel::new(script_b())),
        Value::Object(
            state_a
                .values()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
    )
    .await;

    assert_eq!(state_composed.values(), state_b.values());
    assert_eq!(state_composed.get("a_out"), Some(&json!("findings")));
    assert_eq!(state_composed.get("b_out"), Some(&json!("report")));
}

#[tokio::test]
async fn test_parallel_merge_order_is_declaration_order() {
    // The first-declared child finishes last; merge order must not care.
    let slow = ScriptedModel::with_delay(
        vec![ModelResponse::text("alpha")],
        Duration::from_millis(80),
    );
    let medium = ScriptedModel::with_delay(
        vec![ModelResponse::text("beta")],
        Duration::from_millis(40),
    );
    let fast = ScriptedModel::new(vec![ModelResponse::text("gamma")]);

    let fanout = Agent::Parallel(
        ParallelAgent::builder()
            .name("fanout")
            .agent(leaf_with("first", "first_out", slow))
            .agent(leaf_with("second", "second_out", medium))
            .agent(leaf_with("third", "third_out", fast))
            .collect_into("results")
            .build()
            .unwrap(),
    );

    let state = run(fanout, json!("go")).await;
    assert_eq!(
        state.get("results"),
        Some(&json!(["alpha", "beta", "gamma"]))
    );
}

#[tokio::test]
async fn test_parallel_failure_is_fail_fast() {
    // Second child's script is empty, so its model call fails.
    let ok = ScriptedModel::new(vec![ModelResponse::text("fine")]);
    let broken = ScriptedModel::new(vec![]);

    let fanout = Agent::Parallel(
        ParallelAgent::builder()
            .name("fanout")
            .agent(leaf_with("healthy", "healthy_out", ok))
            .agent(leaf_with("broken", "broken_out", broken))
            .build()
            .unwrap(),
    );

    let graph = fanout.compile(CompileConfig::new()).unwrap();
    let err = graph
        .invoke(json!("go"), RunnableConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentFlowError::ModelCall { .. }));
}

#[tokio::test]
async fn test_loop_count_runs_exactly_n_iterations() {
    let model = ScriptedModel::new(vec![
        ModelResponse::text("round 1"),
        ModelResponse::text("round 2"),
        ModelResponse::text("round 3"),
    ]);
    let speaker = Agent::Leaf(
        LeafAgent::builder()
            .name("speaker")
            .instruction("speak")
            .model(Arc::clone(&model) as Arc<dyn ChatModel>)
            .output_key_with_strategy("speeches", Arc::new(AppendStrategy))
            .build()
            .unwrap(),
    );
    let rounds = Agent::Loop(
        LoopAgent::builder()
            .name("rounds")
            .agent(speaker)
            .count(3)
            .build()
            .unwrap(),
    );

    let state = run(rounds, json!("begin")).await;
    assert_eq!(model.calls(), 3);
    assert_eq!(
        state.get("speeches"),
        Some(&json!(["round 1", "round 2", "round 3"]))
    );
}

#[tokio::test]
async fn test_loop_condition_stops_when_predicate_signals() {
    let model = ScriptedModel::new(vec![
        ModelResponse::text("round 1"),
        ModelResponse::text("round 2"),
        ModelResponse::text("round 3"),
    ]);
    let speaker = Agent::Leaf(
        LeafAgent::builder()
            .name("speaker")
            .instruction("speak")
            .model(Arc::clone(&model) as Arc<dyn ChatModel>)
            .output_key_with_strategy("speeches", Arc::new(AppendStrategy))
            .build()
            .unwrap(),
    );
    let rounds = Agent::Loop(
        LoopAgent::builder()
            .name("rounds")
            .agent(speaker)
            .until(|state| {
                state
                    .get("speeches")
                    .and_then(Value::as_array)
                    .map(|s| s.len() >= 2)
                    .unwrap_or(false)
            })
            .build()
            .unwrap(),
    );

    let state = run(rounds, json!("begin")).await;
    assert_eq!(model.calls(), 2);
    assert_eq!(
        state.get("speeches"),
        Some(&json!(["round 1", "round 2"]))
    );
}

#[tokio::test]
async fn test_loop_condition_never_exceeds_safety_bound() {
    let model = ScriptedModel::new(
        (0..10).map(|i| ModelResponse::text(format!("round {i}"))).collect(),
    );
    let speaker = Agent::Leaf(
        LeafAgent::builder()
            .name("speaker")
            .instruction("speak")
            .model(Arc::clone(&model) as Arc<dyn ChatModel>)
            .build()
            .unwrap(),
    );
    let rounds = Agent::Loop(
        LoopAgent::builder()
            .name("rounds")
            .agent(speaker)
            .until(|_| false)
            .build()
            .unwrap(),
    );

    let graph = rounds
        .compile(CompileConfig::new().with_max_loops(4))
        .unwrap();
    let err = graph
        .invoke(json!("begin"), RunnableConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentFlowError::Execution(_)));
    assert_eq!(model.calls(), 4);
}

#[tokio::test]
async fn test_append_key_accumulates_across_agents() {
    // Two different agents write the same Append key; both writes land in
    // call order.
    let pipeline = Agent::Sequential(
        SequentialAgent::builder()
            .name("pipeline")
            .agent(Agent::Leaf(
                LeafAgent::builder()
                    .name("one")
                    .instruction("speak")
                    .model(ScriptedModel::new(vec![ModelResponse::text("first")]))
                    .output_key_with_strategy("log", Arc::new(AppendStrategy))
                    .build()
                    .unwrap(),
            ))
            .agent(Agent::Leaf(
                LeafAgent::builder()
                    .name("two")
                    .instruction("speak")
                    .model(ScriptedModel::new(vec![ModelResponse::text("second")]))
                    .output_key_with_strategy("log", Arc::new(AppendStrategy))
                    .build()
                    .unwrap(),
            ))
            .build()
            .unwrap(),
    );

    let state = run(pipeline, json!("go")).await;
    assert_eq!(state.get("log"), Some(&json!(["first", "second"])));
}
