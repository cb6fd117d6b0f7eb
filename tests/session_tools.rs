//! Integration tests for the tool-facing operations of write sessions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stratagem::prelude::*;
use stratagem::testing::{MockLLMClient, context_for};
use stratagem::{AnyTool, ToolChoice, ToolOutcome};

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
        Ok(args.a + args.b)
    }
}

fn plus_registry() -> ToolRegistry {
    ToolRegistry::simple(vec![Arc::new(Plus) as Arc<dyn AnyTool>]).unwrap()
}

#[test]
fn test_simple_registry_uses_the_default_stage() {
    let registry = plus_registry();
    assert_eq!(registry.stages().len(), 1);
    let stage = registry.default_stage().unwrap();
    assert_eq!(stage.name(), DEFAULT_STAGE);
    assert!(stage.get_tool("plus").is_some());
    assert!(registry.get_tool::<Plus>().is_some());
}

#[tokio::test]
async fn test_tools_called_from_a_session_leave_the_prompt_alone() {
    let ctx = context_for(
        Arc::new(MockLLMClient::new()),
        plus_registry(),
        AgentConfig::default(),
    );

    let (typed, by_name, undecodable) = ctx
        .llm()
        .write_session(|session| {
            Box::pin(async move {
                let typed = session.call_tool::<Plus>(Operands { a: 2, b: 3 }).await?;
                let by_name = session.call_tool_by_name("plus", json!({"a": 1, "b": 1})).await?;
                let undecodable = session
                    .call_tool_by_name("plus", json!({"a": "one", "b": 1}))
                    .await?;
                Ok((typed, by_name, undecodable))
            })
        })
        .await
        .unwrap();

    assert_eq!(typed.result(), Some(&5));
    assert_eq!(typed.content(), "5");

    assert_eq!(by_name.outcome, ToolOutcome::Success);
    assert_eq!(by_name.content, "2");
    assert_eq!(by_name.result, Some(json!(2)));

    // Same classification as a model tool call with bad arguments.
    assert_eq!(undecodable.outcome, ToolOutcome::DecodeFailure);
    assert!(undecodable.content.starts_with("Failed to parse arguments for tool 'plus'"));

    assert!(ctx.llm().prompt().await.is_empty());
}

#[tokio::test]
async fn test_calling_an_unknown_tool_from_a_session_fails() {
    let ctx = context_for(
        Arc::new(MockLLMClient::new()),
        plus_registry(),
        AgentConfig::default(),
    );

    let err = ctx
        .llm()
        .write_session(|session| {
            Box::pin(async move { session.call_tool_by_name("minus", json!({})).await })
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::ToolNotFound(name) if name == "minus"));
}

#[tokio::test]
async fn test_forced_tool_call_applies_to_one_request_only() {
    let client = Arc::new(MockLLMClient::new().tool_call("plus", json!({"a": 2, "b": 2})));
    let ctx = context_for(client.clone(), plus_registry(), AgentConfig::default());

    let reply = ctx
        .llm()
        .write_session(|session| {
            Box::pin(async move {
                session.set_tool_choice(Some(ToolChoice::Auto))?;
                session.update_prompt(|p| {
                    p.user("What is 2 + 2?");
                })?;
                session.request_llm_only_calling_tools().await
            })
        })
        .await
        .unwrap();
    assert!(matches!(reply, Message::ToolCall(ref call) if call.tool == "plus"));

    let sent = client.prompts().await;
    assert_eq!(sent[0].params.tool_choice, Some(ToolChoice::Required));
    let offered: Vec<String> = client.offered_tools().await[0]
        .iter()
        .map(|d| d.name.clone())
        .collect();
    assert_eq!(offered, vec!["plus".to_string()]);

    // The committed prompt keeps the session-wide choice.
    let prompt = ctx.llm().prompt().await;
    assert_eq!(prompt.params.tool_choice, Some(ToolChoice::Auto));
    assert_eq!(prompt.len(), 2);
}

#[tokio::test]
async fn test_request_prefers_the_tool_call_over_narration() {
    let client = Arc::new(MockLLMClient::new().turn(vec![
        Message::assistant("Let me add that."),
        Message::ToolCall(ToolCall::new(Some("c1".into()), "plus", r#"{"a": 2, "b": 2}"#)),
    ]));
    let ctx = context_for(client, plus_registry(), AgentConfig::default());

    let reply = ctx
        .llm()
        .write_session(|session| Box::pin(async move { session.request_llm().await }))
        .await
        .unwrap();
    assert!(matches!(reply, Message::ToolCall(ref call) if call.id.as_deref() == Some("c1")));
    // Both responses are kept in order.
    let prompt = ctx.llm().prompt().await;
    assert_eq!(prompt.messages()[0], Message::assistant("Let me add that."));
    assert_eq!(prompt.len(), 2);
}
