//! Prebuilt strategies.

use super::edge::Edge;
use super::nodes::*;
use super::strategy::{FINISH, START, Strategy};
use crate::core::error::GraphError;
use crate::core::value::ValueKind;

/// How [`single_run_strategy`] executes the tool calls of one model turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolCallMode {
    /// One tool call per turn.
    #[default]
    Sequential,
    /// Every tool call of a turn, executed concurrently.
    Parallel,
}

/// The classic tool loop: send the input to the model, execute the tool calls
/// it asks for and feed their results back until it answers with plain text.
pub fn single_run_strategy(mode: ToolCallMode) -> Result<Strategy, GraphError> {
    let builder = Strategy::builder("single_run")
        .input(ValueKind::Text)
        .output(ValueKind::Text);

    match mode {
        ToolCallMode::Sequential => builder
            .node(node_llm_request("call_llm", true))
            .node(node_execute_tool("execute_tool"))
            .node(node_llm_send_tool_result("send_tool_result"))
            .edge(START, Edge::forward_to("call_llm"))
            .edge("call_llm", Edge::forward_to("execute_tool").on_tool_call(|_| true))
            .edge("call_llm", Edge::forward_to(FINISH).on_assistant_message(|_| true))
            .edge("execute_tool", Edge::forward_to("send_tool_result"))
            .edge(
                "send_tool_result",
                Edge::forward_to("execute_tool").on_tool_call(|_| true),
            )
            .edge(
                "send_tool_result",
                Edge::forward_to(FINISH).on_assistant_message(|_| true),
            )
            .build(),
        ToolCallMode::Parallel => builder
            .node(node_llm_request_multiple("call_llm"))
            .node(node_execute_multiple_tools("execute_tools", true))
            .node(node_llm_send_multiple_tool_results("send_tool_results"))
            .edge(START, Edge::forward_to("call_llm"))
            .edge(
                "call_llm",
                Edge::forward_to("execute_tools").on_multiple_tool_calls(|_| true),
            )
            .edge(
                "call_llm",
                Edge::forward_to(FINISH).on_multiple_assistant_messages(|_| true),
            )
            .edge("execute_tools", Edge::forward_to("send_tool_results"))
            .edge(
                "send_tool_results",
                Edge::forward_to("execute_tools").on_multiple_tool_calls(|_| true),
            )
            .edge(
                "send_tool_results",
                Edge::forward_to(FINISH).on_multiple_assistant_messages(|_| true),
            )
            .build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prebuilt_strategies_validate() {
        for mode in [ToolCallMode::Sequential, ToolCallMode::Parallel] {
            let strategy = single_run_strategy(mode).unwrap();
            assert_eq!(strategy.input_kind(), ValueKind::Text);
            assert_eq!(strategy.edges_from("call_llm").len(), 2);
        }
    }
}
