//! End-to-end agent runs against a scripted model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stratagem::agent::{AgentToEnvironment, TerminationContent};
use stratagem::prelude::*;
use stratagem::testing::MockLLMClient;
use stratagem::{
    AgentEnvironment, FeaturePipeline, RegistryError, RunEnvironment, ToolOutcome,
};
use uuid::Uuid;

#[derive(Deserialize)]
struct Operands {
    a: i64,
    b: i64,
}

struct Plus;

#[async_trait]
impl Tool for Plus {
    type Args = Operands;
    type Output = i64;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("plus", "Adds two integers")
            .required("a", "left operand", ToolParameterType::Integer)
            .required("b", "right operand", ToolParameterType::Integer)
    }

    async fn execute(&self, args: Operands) -> Result<i64, ToolError> {
        // Larger sums take longer, so completion order differs from call order.
        tokio::time::sleep(Duration::from_millis((args.a + args.b) as u64)).await;
        Ok(args.a + args.b)
    }
}

struct Divide;

#[async_trait]
impl Tool for Divide {
    type Args = Operands;
    type Output = i64;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("divide", "Divides a by b")
            .required("a", "dividend", ToolParameterType::Integer)
            .required("b", "divisor", ToolParameterType::Integer)
    }

    async fn execute(&self, args: Operands) -> Result<i64, ToolError> {
        if args.b == 0 {
            return Err(ToolError::Execution("division by zero".to_string()));
        }
        Ok(args.a / args.b)
    }
}

fn math_registry() -> ToolRegistry {
    ToolRegistry::builder()
        .stage(ToolStage::new(DEFAULT_STAGE).tool(Plus).tool(Divide))
        .build()
        .unwrap()
}

fn call(id: &str, tool: &str, args: serde_json::Value) -> Message {
    Message::ToolCall(ToolCall::new(Some(id.to_string()), tool, args.to_string()))
}

#[tokio::test]
async fn test_plus_tool_round_trip() {
    let tool_calls = Arc::new(Mutex::new(Vec::new()));
    let results = Arc::new(Mutex::new(Vec::new()));
    let handler = {
        let tool_calls = Arc::clone(&tool_calls);
        let results = Arc::clone(&results);
        EventHandler::new()
            .on_tool_call(move |event| tool_calls.lock().unwrap().push(event.tool_name.clone()))
            .on_tool_call_result(move |event| results.lock().unwrap().push(event.result.clone()))
    };

    let client = Arc::new(
        MockLLMClient::new()
            .tool_call("plus", json!({"a": 2, "b": 2}))
            .reply("2 + 2 = 4"),
    );
    let agent = AIAgent::builder(client.clone(), single_run_strategy(ToolCallMode::Sequential).unwrap())
        .with_config(AgentConfig::default().with_system_prompt("You are a calculator."))
        .with_tool_registry(math_registry())
        .with_feature(Arc::new(handler))
        .build()
        .await
        .unwrap();

    let outcome = agent.run("What is 2 + 2?").await.unwrap();
    assert_eq!(outcome.result.as_deref(), Some("2 + 2 = 4"));
    assert_eq!(*tool_calls.lock().unwrap(), vec!["plus".to_string()]);
    assert_eq!(*results.lock().unwrap(), vec!["4".to_string()]);

    let prompts = client.prompts().await;
    assert_eq!(prompts.len(), 2);
    let last = prompts[1].messages().last().unwrap();
    assert!(matches!(last, Message::ToolResult(r) if r.tool == "plus" && r.content == "4"));
    assert!(!agent.is_running());
}

#[tokio::test]
async fn test_parallel_batch_keeps_call_order_when_one_fails() {
    let failures = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&failures);
    let client = Arc::new(
        MockLLMClient::new()
            .turn(vec![
                call("c1", "plus", json!({"a": 20, "b": 20})),
                call("c2", "divide", json!({"a": 1, "b": 0})),
                call("c3", "plus", json!({"a": 1, "b": 1})),
            ])
            .reply("done"),
    );
    let agent = AIAgent::builder(client.clone(), single_run_strategy(ToolCallMode::Parallel).unwrap())
        .with_tool_registry(math_registry())
        .with_feature(Arc::new(EventHandler::new().on_tool_call_failure(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        })))
        .build()
        .await
        .unwrap();

    let result = agent.run_and_get_result("compute").await.unwrap();
    assert_eq!(result.as_deref(), Some("done"));
    assert_eq!(failures.load(Ordering::SeqCst), 1);

    let prompts = client.prompts().await;
    let fed_back: Vec<(Option<String>, String)> = prompts[1]
        .messages()
        .iter()
        .filter_map(|m| match m {
            Message::ToolResult(r) => Some((r.id.clone(), r.content.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        fed_back,
        vec![
            (Some("c1".to_string()), "40".to_string()),
            (
                Some("c2".to_string()),
                "Tool 'divide' failed: division by zero".to_string(),
            ),
            (Some("c3".to_string()), "2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_narration_next_to_a_tool_call_does_not_end_the_run() {
    for mode in [ToolCallMode::Sequential, ToolCallMode::Parallel] {
        let tool_calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&tool_calls);
        let client = Arc::new(
            MockLLMClient::new()
                .turn(vec![
                    Message::assistant("Let me add that."),
                    call("c1", "plus", json!({"a": 2, "b": 2})),
                ])
                .reply("4"),
        );
        let agent = AIAgent::builder(client.clone(), single_run_strategy(mode).unwrap())
            .with_tool_registry(math_registry())
            .with_feature(Arc::new(EventHandler::new().on_tool_call(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            })))
            .build()
            .await
            .unwrap();

        let result = agent.run_and_get_result("What is 2 + 2?").await.unwrap();
        assert_eq!(result.as_deref(), Some("4"), "{:?}", mode);
        assert_eq!(tool_calls.load(Ordering::SeqCst), 1, "{:?}", mode);

        // The narration stays in history and the call is answered.
        let prompts = client.prompts().await;
        assert_eq!(prompts.len(), 2, "{:?}", mode);
        let sent = prompts[1].messages();
        assert_eq!(sent[1], Message::assistant("Let me add that."));
        assert!(matches!(&sent[2], Message::ToolCall(c) if c.tool == "plus"));
        assert!(matches!(&sent[3], Message::ToolResult(r) if r.id.as_deref() == Some("c1") && r.content == "4"));
    }
}

#[tokio::test]
async fn test_second_concurrent_run_is_rejected() {
    let client = Arc::new(
        MockLLMClient::new()
            .with_fallback(vec![Message::assistant("done")])
            .with_delay(Duration::from_millis(50)),
    );
    let agent = AIAgent::builder(client, single_run_strategy(ToolCallMode::Sequential).unwrap())
        .build()
        .await
        .unwrap();

    let (first, second) = tokio::join!(agent.run("one"), agent.run("two"));
    assert_eq!(first.unwrap().result.as_deref(), Some("done"));
    assert!(matches!(second, Err(AgentError::AlreadyRunning)));

    // The guard is released once the first run is over.
    assert_eq!(agent.run_and_get_result("three").await.unwrap().as_deref(), Some("done"));
}

fn failing_strategy() -> Strategy {
    Strategy::builder("failing")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .node(StrategyNode::from_fn(
            "explode",
            ValueKind::Text,
            ValueKind::Text,
            |_ctx, _input| Box::pin(async move { Err::<NodeValue, _>(AgentError::node("explode", "boom")) }),
        ))
        .edge(START, Edge::forward_to("explode"))
        .edge("explode", Edge::forward_to(FINISH))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_error_handler_turns_failure_into_empty_result() {
    let agent = AIAgent::builder(Arc::new(MockLLMClient::new()), failing_strategy())
        .with_error_handler(|e: &AgentError| matches!(e, AgentError::Node { .. }))
        .build()
        .await
        .unwrap();
    let outcome = agent.run("go").await.unwrap();
    assert_eq!(outcome.result, None);

    let strict = AIAgent::builder(Arc::new(MockLLMClient::new()), failing_strategy())
        .with_error_handler(|e: &AgentError| matches!(e, AgentError::Llm(_)))
        .build()
        .await
        .unwrap();
    assert!(matches!(strict.run("go").await, Err(AgentError::Node { .. })));
}

#[tokio::test]
async fn test_node_may_terminate_the_run_early() {
    let strategy = Strategy::builder("early_exit")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .node(StrategyNode::from_fn(
            "finish_now",
            ValueKind::Text,
            ValueKind::Text,
            |ctx, input| {
                Box::pin(async move {
                    ctx.environment()
                        .send_termination_message(Some("early".to_string()))
                        .await?;
                    Ok(input)
                })
            },
        ))
        .edge(START, Edge::forward_to("finish_now"))
        .edge("finish_now", Edge::forward_to(FINISH))
        .build()
        .unwrap();

    let agent = AIAgent::builder(Arc::new(MockLLMClient::new()), strategy)
        .build()
        .await
        .unwrap();
    assert_eq!(agent.run_and_get_result("late").await.unwrap().as_deref(), Some("early"));
}

#[tokio::test]
async fn test_termination_through_another_tool_is_rejected() {
    let run_id = Uuid::new_v4();
    let (environment, _result) = RunEnvironment::new(
        run_id,
        Arc::new(math_registry()),
        Arc::new(FeaturePipeline::new()),
        Vec::new(),
    );

    let wrong_tool = environment
        .process(AgentToEnvironment::Termination {
            run_id,
            content: Some(TerminationContent {
                tool_name: "plus".into(),
                tool_args: json!({"result": "4"}),
            }),
        })
        .await;
    assert!(matches!(wrong_tool, Err(AgentError::Precondition(_))));

    let missing = environment
        .process(AgentToEnvironment::Termination {
            run_id,
            content: None,
        })
        .await;
    assert!(matches!(missing, Err(AgentError::Precondition(_))));
}

#[tokio::test]
async fn test_unknown_and_malformed_calls_come_back_as_results() {
    let run_id = Uuid::new_v4();
    let (environment, _result) = RunEnvironment::new(
        run_id,
        Arc::new(math_registry()),
        Arc::new(FeaturePipeline::new()),
        Vec::new(),
    );
    let results = environment
        .execute_tools(vec![
            ToolCall::new(Some("1".into()), "minus", r#"{"a": 1, "b": 1}"#),
            ToolCall::new(Some("2".into()), "plus", r#"{"a": "one"}"#),
            ToolCall::new(Some("3".into()), "plus", r#"{"a": 1, "b": 2}"#),
        ])
        .await
        .unwrap();
    let outcomes: Vec<ToolOutcome> = results.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![ToolOutcome::NotFound, ToolOutcome::DecodeFailure, ToolOutcome::Success]
    );
    assert_eq!(results[2].result, Some(json!(3)));
}

#[tokio::test]
async fn test_registry_and_agent_configuration_are_checked() {
    let duplicate_tool = ToolRegistry::builder()
        .stage(ToolStage::new("math").tool(Plus).tool(Plus))
        .build();
    assert!(matches!(duplicate_tool, Err(RegistryError::DuplicateTool { .. })));

    let empty_stage = ToolRegistry::builder().stage(ToolStage::new("empty")).build();
    assert_eq!(empty_stage.err(), Some(RegistryError::EmptyStage("empty".into())));

    let duplicate_stage = ToolRegistry::builder()
        .stage(ToolStage::new("math").tool(Plus))
        .stage(ToolStage::new("math").tool(Divide))
        .build();
    assert_eq!(duplicate_stage.err(), Some(RegistryError::DuplicateStage("math".into())));

    let staged = Strategy::builder("staged")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .tool_stage("science")
        .node(node_do_nothing("pass"))
        .edge(START, Edge::forward_to("pass"))
        .edge("pass", Edge::forward_to(FINISH))
        .build()
        .unwrap();
    let missing_stage = AIAgent::builder(Arc::new(MockLLMClient::new()), staged)
        .with_tool_registry(math_registry())
        .build()
        .await;
    assert!(matches!(missing_stage, Err(AgentError::Config(_))));

    let no_budget = AIAgent::builder(Arc::new(MockLLMClient::new()), failing_strategy())
        .with_config(AgentConfig::default().with_max_agent_iterations(0))
        .build()
        .await;
    assert!(matches!(no_budget, Err(AgentError::Config(_))));
}

#[tokio::test]
async fn test_strategy_stage_limits_offered_tools() {
    let registry = ToolRegistry::builder()
        .stage(ToolStage::new("addition").tool(Plus))
        .stage(ToolStage::new("division").tool(Divide))
        .build()
        .unwrap();
    let strategy = Strategy::builder("adder")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .tool_stage("addition")
        .node(node_llm_request("ask", true))
        .edge(START, Edge::forward_to("ask"))
        .edge("ask", Edge::forward_to(FINISH).on_assistant_message(|_| true))
        .build()
        .unwrap();
    let client = Arc::new(MockLLMClient::new().reply("ok"));
    let agent = AIAgent::builder(client.clone(), strategy)
        .with_tool_registry(registry)
        .build()
        .await
        .unwrap();

    agent.run("hello").await.unwrap();
    let offered: Vec<Vec<String>> = client
        .offered_tools()
        .await
        .into_iter()
        .map(|tools| tools.into_iter().map(|t| t.name).collect())
        .collect();
    assert_eq!(offered, vec![vec!["plus".to_string()]]);
}
