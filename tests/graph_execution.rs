//! Integration tests for strategy traversal: edge selection, cycles, budgets
//! and nested strategies.

use std::sync::{Arc, Mutex};

use stratagem::prelude::*;
use stratagem::testing::{MockLLMClient, context_for};

fn ctx(max_iterations: usize) -> AgentContext {
    context_for(
        Arc::new(MockLLMClient::new()),
        ToolRegistry::empty(),
        AgentConfig::default().with_max_agent_iterations(max_iterations),
    )
}

fn text_node(name: &str, f: fn(&str) -> String) -> StrategyNode {
    StrategyNode::from_fn(name, ValueKind::Text, ValueKind::Text, move |_ctx, input| {
        Box::pin(async move {
            let text = input.as_text().unwrap_or_default();
            Ok(NodeValue::Text(f(text)))
        })
    })
}

fn text(value: &NodeValue) -> &str {
    value.as_text().unwrap_or_default()
}

#[tokio::test]
async fn test_first_matching_edge_wins() {
    let strategy = Strategy::builder("routing")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .node(text_node("upper", |t| t.to_uppercase()))
        .node(text_node("reverse", |t| t.chars().rev().collect()))
        .edge(START, Edge::forward_to("upper").on_condition(|v| text(v).starts_with('a')))
        // Also matches inputs starting with 'a', but is declared second.
        .edge(START, Edge::forward_to("reverse").on_condition(|v| text(v).len() > 1))
        .edge("upper", Edge::forward_to(FINISH))
        .edge("reverse", Edge::forward_to(FINISH))
        .build()
        .unwrap();

    let ctx = ctx(10);
    let first = strategy.execute(&ctx, NodeValue::Text("abc".into())).await.unwrap();
    assert_eq!(first, NodeValue::Text("ABC".into()));
    let second = strategy.execute(&ctx, NodeValue::Text("xyz".into())).await.unwrap();
    assert_eq!(second, NodeValue::Text("zyx".into()));
}

#[tokio::test]
async fn test_bounded_cycle_reaches_finish() {
    let strategy = Strategy::builder("loop")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .node(text_node("grow", |t| format!("{}x", t)))
        .edge(START, Edge::forward_to("grow"))
        .edge("grow", Edge::forward_to("grow").on_condition(|v| text(v).len() < 3))
        .edge("grow", Edge::forward_to(FINISH))
        .build()
        .unwrap();

    let ctx = ctx(10);
    let result = strategy.execute(&ctx, NodeValue::Text(String::new())).await.unwrap();
    assert_eq!(result, NodeValue::Text("xxx".into()));
    // Start plus three passes through the loop.
    assert_eq!(ctx.iterations(), 4);
}

#[tokio::test]
async fn test_output_without_matching_edge_fails() {
    let strategy = Strategy::builder("picky")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .node(node_do_nothing("pass"))
        .edge(START, Edge::forward_to("pass"))
        .edge("pass", Edge::forward_to(FINISH).on_condition(|v| text(v) == "ok"))
        .build()
        .unwrap();

    let err = strategy
        .execute(&ctx(10), NodeValue::Text("not ok".into()))
        .await
        .unwrap_err();
    match err {
        AgentError::UnhandledOutput { node, kind } => {
            assert_eq!(node, "pass");
            assert_eq!(kind, ValueKind::Text);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_unbounded_cycle_hits_iteration_budget() {
    let strategy = Strategy::builder("forever")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .node(node_do_nothing("spin"))
        .edge(START, Edge::forward_to("spin"))
        .edge("spin", Edge::forward_to("spin"))
        .build()
        .unwrap();

    let ctx = ctx(5);
    let err = strategy
        .execute(&ctx, NodeValue::Text("x".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::MaxIterationsReached(5)));
}

#[tokio::test]
async fn test_node_errors_reach_hooks_and_caller() {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&failures);
    let strategy = Strategy::builder("failing")
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
        .unwrap();

    let client = Arc::new(MockLLMClient::new());
    let agent = AIAgent::builder(client, strategy)
        .with_feature(Arc::new(EventHandler::new().on_agent_run_error(move |event| {
            seen.lock().unwrap().push(event.error.clone());
        })))
        .build()
        .await
        .unwrap();

    let err = agent.run("go").await.unwrap_err();
    assert!(matches!(err, AgentError::Node { .. }));
    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("boom"));
}

#[tokio::test]
async fn test_subgraph_runs_as_one_node() {
    let inner = Strategy::builder("shout")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .node(text_node("upper", |t| t.to_uppercase()))
        .edge(START, Edge::forward_to("upper"))
        .edge("upper", Edge::forward_to(FINISH))
        .build()
        .unwrap();
    let outer = Strategy::builder("outer")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .subgraph("inner", inner)
        .node(text_node("exclaim", |t| format!("{}!", t)))
        .edge(START, Edge::forward_to("inner"))
        .edge("inner", Edge::forward_to("exclaim"))
        .edge("exclaim", Edge::forward_to(FINISH))
        .build()
        .unwrap();

    let result = outer
        .execute(&ctx(20), NodeValue::Text("hey".into()))
        .await
        .unwrap();
    assert_eq!(result, NodeValue::Text("HEY!".into()));
}

#[tokio::test]
async fn test_parallel_branches_keep_branch_order() {
    let branch = |name: &str, f: fn(&str) -> String| {
        Strategy::builder(name)
            .input(ValueKind::Text)
            .output(ValueKind::Text)
            .node(text_node("apply", f))
            .edge(START, Edge::forward_to("apply"))
            .edge("apply", Edge::forward_to(FINISH))
            .build()
            .unwrap()
    };
    let strategy = Strategy::builder("fan_out")
        .input(ValueKind::Text)
        .output(ValueKind::List)
        .parallel(
            "both",
            vec![
                branch("upper", |t| t.to_uppercase()),
                branch("double", |t| t.repeat(2)),
            ],
        )
        .edge(START, Edge::forward_to("both"))
        .edge("both", Edge::forward_to(FINISH))
        .build()
        .unwrap();

    let result = strategy
        .execute(&ctx(20), NodeValue::Text("ab".into()))
        .await
        .unwrap();
    assert_eq!(
        result,
        NodeValue::List(vec![
            NodeValue::Text("AB".into()),
            NodeValue::Text("abab".into()),
        ])
    );
}

#[test]
fn test_kind_mismatch_is_caught_at_build_time() {
    let err = Strategy::builder("mismatch")
        .input(ValueKind::Text)
        .output(ValueKind::Text)
        .node(node_execute_tool("execute_tool"))
        .edge(START, Edge::forward_to("execute_tool"))
        .edge("execute_tool", Edge::forward_to(FINISH))
        .build()
        .unwrap_err();
    assert!(matches!(err, stratagem::GraphError::Validation { .. }));
}
