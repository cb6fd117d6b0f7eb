//! Ready-made nodes covering the usual LLM and tool steps.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::node::StrategyNode;
use crate::core::error::AgentError;
use crate::core::prompt::{Message, PromptBuilder};
use crate::core::session::StructuredRequestConfig;
use crate::core::value::{NodeValue, ValueKind};

const COMPRESS_HISTORY_REQUEST: &str = "Summarize the conversation so far. Keep every fact, \
decision and tool result needed to continue the task. Reply with the summary only.";

fn expect_text(node: &str, input: NodeValue) -> Result<String, AgentError> {
    match input {
        NodeValue::Text(text) => Ok(text),
        other => Err(AgentError::UnexpectedInput {
            node: node.to_string(),
            expected: ValueKind::Text,
            actual: other.kind(),
        }),
    }
}

/// Passes its input through.
pub fn node_do_nothing(name: impl Into<String>) -> StrategyNode {
    StrategyNode::identity(name, ValueKind::Any)
}

/// Appends messages to the prompt, then passes its input through.
pub fn node_update_prompt<F>(name: impl Into<String>, edit: F) -> StrategyNode
where
    F: Fn(&mut PromptBuilder) + Send + Sync + 'static,
{
    let edit = Arc::new(edit);
    StrategyNode::from_fn(name, ValueKind::Any, ValueKind::Any, move |ctx, input| {
        let edit = Arc::clone(&edit);
        Box::pin(async move {
            ctx.llm()
                .write_session(move |session| {
                    Box::pin(async move { session.update_prompt(|p| edit(p)) })
                })
                .await?;
            Ok(input)
        })
    })
}

/// Appends the text input as a user message and asks the model for a reply.
/// With `allow_tools` the session tools are offered.
pub fn node_llm_request(name: impl Into<String>, allow_tools: bool) -> StrategyNode {
    let name = name.into();
    let node = name.clone();
    StrategyNode::from_fn(name, ValueKind::Text, ValueKind::Message, move |ctx, input| {
        let node = node.clone();
        Box::pin(async move {
            let text = expect_text(&node, input)?;
            let reply = ctx
                .llm()
                .write_session(move |session| {
                    Box::pin(async move {
                        session.update_prompt(|p| {
                            p.user(text);
                        })?;
                        if allow_tools {
                            session.request_llm().await
                        } else {
                            session.request_llm_without_tools().await
                        }
                    })
                })
                .await?;
            Ok(NodeValue::Message(reply))
        })
    })
}

/// Like [`node_llm_request`] with tools, but returns every response of the turn.
pub fn node_llm_request_multiple(name: impl Into<String>) -> StrategyNode {
    let name = name.into();
    let node = name.clone();
    StrategyNode::from_fn(name, ValueKind::Text, ValueKind::Messages, move |ctx, input| {
        let node = node.clone();
        Box::pin(async move {
            let text = expect_text(&node, input)?;
            let replies = ctx
                .llm()
                .write_session(move |session| {
                    Box::pin(async move {
                        session.update_prompt(|p| {
                            p.user(text);
                        })?;
                        session.request_llm_multiple().await
                    })
                })
                .await?;
            Ok(NodeValue::Messages(replies))
        })
    })
}

/// Streams the reply, collects the chunks and records the full text as an
/// assistant message.
pub fn node_llm_request_streaming(name: impl Into<String>) -> StrategyNode {
    let name = name.into();
    let node = name.clone();
    StrategyNode::from_fn(name, ValueKind::Text, ValueKind::Text, move |ctx, input| {
        let node = node.clone();
        Box::pin(async move {
            let text = expect_text(&node, input)?;
            let reply = ctx
                .llm()
                .write_session(move |session| {
                    Box::pin(async move {
                        session.update_prompt(|p| {
                            p.user(text);
                        })?;
                        let mut stream = session.request_llm_streaming().await?;
                        let mut reply = String::new();
                        while let Some(chunk) = stream.next().await {
                            reply.push_str(&chunk?);
                        }
                        let recorded = reply.clone();
                        session.update_prompt(|p| {
                            p.assistant(recorded);
                        })?;
                        Ok(reply)
                    })
                })
                .await?;
            Ok(NodeValue::Text(reply))
        })
    })
}

/// Asks for a reply decoded into `T` and forwards it as JSON.
pub fn node_llm_request_structured<T>(
    name: impl Into<String>,
    config: StructuredRequestConfig,
) -> StrategyNode
where
    T: DeserializeOwned + Serialize + Send + 'static,
{
    let name = name.into();
    let node = name.clone();
    StrategyNode::from_fn(name, ValueKind::Text, ValueKind::Json, move |ctx, input| {
        let node = node.clone();
        let config = config.clone();
        Box::pin(async move {
            let text = expect_text(&node, input)?;
            let response = ctx
                .llm()
                .write_session(move |session| {
                    Box::pin(async move {
                        session.update_prompt(|p| {
                            p.user(text);
                        })?;
                        session.request_llm_structured::<T>(config).await
                    })
                })
                .await?;
            Ok(NodeValue::Json(serde_json::to_value(&response.structure)?))
        })
    })
}

/// Executes a single tool call through the environment.
pub fn node_execute_tool(name: impl Into<String>) -> StrategyNode {
    let name = name.into();
    let node = name.clone();
    StrategyNode::from_fn(name, ValueKind::ToolCall, ValueKind::ToolResult, move |ctx, input| {
        let node = node.clone();
        Box::pin(async move {
            let call = match input {
                NodeValue::ToolCall(call) => call,
                other => {
                    return Err(AgentError::UnexpectedInput {
                        node,
                        expected: ValueKind::ToolCall,
                        actual: other.kind(),
                    });
                }
            };
            let result = ctx.environment().execute_tool(call).await?;
            Ok(NodeValue::ToolResult(result))
        })
    })
}

/// Executes a batch of tool calls, one after another or concurrently.
/// Results keep the order of the calls either way.
pub fn node_execute_multiple_tools(name: impl Into<String>, parallel: bool) -> StrategyNode {
    let name = name.into();
    let node = name.clone();
    StrategyNode::from_fn(name, ValueKind::ToolCalls, ValueKind::ToolResults, move |ctx, input| {
        let node = node.clone();
        Box::pin(async move {
            let calls = match input {
                NodeValue::ToolCalls(calls) => calls,
                other => {
                    return Err(AgentError::UnexpectedInput {
                        node,
                        expected: ValueKind::ToolCalls,
                        actual: other.kind(),
                    });
                }
            };
            let environment = ctx.environment();
            let results = if parallel {
                environment.execute_tools(calls).await?
            } else {
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    results.push(environment.execute_tool(call).await?);
                }
                results
            };
            Ok(NodeValue::ToolResults(results))
        })
    })
}

/// Appends a tool result to the prompt and asks the model to continue.
pub fn node_llm_send_tool_result(name: impl Into<String>) -> StrategyNode {
    let name = name.into();
    let node = name.clone();
    StrategyNode::from_fn(name, ValueKind::ToolResult, ValueKind::Message, move |ctx, input| {
        let node = node.clone();
        Box::pin(async move {
            let result = match input {
                NodeValue::ToolResult(result) => result,
                other => {
                    return Err(AgentError::UnexpectedInput {
                        node,
                        expected: ValueKind::ToolResult,
                        actual: other.kind(),
                    });
                }
            };
            let reply = ctx
                .llm()
                .write_session(move |session| {
                    Box::pin(async move {
                        session.update_prompt(|p| {
                            p.message(result.to_message());
                        })?;
                        session.request_llm().await
                    })
                })
                .await?;
            Ok(NodeValue::Message(reply))
        })
    })
}

/// Appends a batch of tool results and returns every response of the next turn.
pub fn node_llm_send_multiple_tool_results(name: impl Into<String>) -> StrategyNode {
    let name = name.into();
    let node = name.clone();
    StrategyNode::from_fn(name, ValueKind::ToolResults, ValueKind::Messages, move |ctx, input| {
        let node = node.clone();
        Box::pin(async move {
            let results = match input {
                NodeValue::ToolResults(results) => results,
                other => {
                    return Err(AgentError::UnexpectedInput {
                        node,
                        expected: ValueKind::ToolResults,
                        actual: other.kind(),
                    });
                }
            };
            let replies = ctx
                .llm()
                .write_session(move |session| {
                    Box::pin(async move {
                        session.update_prompt(|p| {
                            p.messages(results.iter().map(|r| r.to_message()));
                        })?;
                        session.request_llm_multiple().await
                    })
                })
                .await?;
            Ok(NodeValue::Messages(replies))
        })
    })
}

/// Replaces the history with a model-written summary.
///
/// System messages and the first user message are kept; everything else is
/// folded into one assistant message. The input passes through.
pub fn node_llm_compress_history(name: impl Into<String>) -> StrategyNode {
    StrategyNode::from_fn(name, ValueKind::Any, ValueKind::Any, |ctx, input| {
        Box::pin(async move {
            ctx.llm()
                .write_session(|session| {
                    Box::pin(async move {
                        let original = session.prompt()?.clone();
                        session.update_prompt(|p| {
                            p.user(COMPRESS_HISTORY_REQUEST);
                        })?;
                        let summary = session.request_llm_without_tools().await?;

                        let mut kept: Vec<Message> = original
                            .messages()
                            .iter()
                            .filter(|m| matches!(m, Message::System { .. }))
                            .cloned()
                            .collect();
                        if let Some(first_user) = original
                            .messages()
                            .iter()
                            .find(|m| matches!(m, Message::User { .. }))
                        {
                            kept.push(first_user.clone());
                        }
                        kept.push(Message::assistant(summary.content()));
                        log::debug!(
                            "Compressed history from {} to {} messages",
                            original.len(),
                            kept.len()
                        );
                        session.rewrite_prompt(|prompt| prompt.with_messages(kept))
                    })
                })
                .await?;
            Ok(input)
        })
    })
}
