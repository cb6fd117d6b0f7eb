//! The value envelope flowing along strategy edges.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::prompt::{Message, ToolCall};
use crate::core::tools::result::ReceivedToolResult;

/// The value consumed and produced by strategy nodes.
///
/// Nodes declare which [`ValueKind`] they accept and produce, and the strategy
/// builder checks those declarations against the edges before a run ever starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NodeValue {
    Unit,
    Text(String),
    Json(serde_json::Value),
    Message(Message),
    Messages(Vec<Message>),
    ToolCall(ToolCall),
    ToolCalls(Vec<ToolCall>),
    ToolResult(ReceivedToolResult),
    ToolResults(Vec<ReceivedToolResult>),
    List(Vec<NodeValue>),
}

/// Type tag of a [`NodeValue`], used by the build-time type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Any,
    Unit,
    Text,
    Json,
    Message,
    Messages,
    ToolCall,
    ToolCalls,
    ToolResult,
    ToolResults,
    List,
}

impl ValueKind {
    /// Whether a value of kind `self` may be handed to something expecting `expected`.
    pub fn fits(self, expected: ValueKind) -> bool {
        self == ValueKind::Any || expected == ValueKind::Any || self == expected
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Any => "any",
            ValueKind::Unit => "unit",
            ValueKind::Text => "text",
            ValueKind::Json => "json",
            ValueKind::Message => "message",
            ValueKind::Messages => "messages",
            ValueKind::ToolCall => "tool_call",
            ValueKind::ToolCalls => "tool_calls",
            ValueKind::ToolResult => "tool_result",
            ValueKind::ToolResults => "tool_results",
            ValueKind::List => "list",
        };
        f.write_str(name)
    }
}

impl NodeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            NodeValue::Unit => ValueKind::Unit,
            NodeValue::Text(_) => ValueKind::Text,
            NodeValue::Json(_) => ValueKind::Json,
            NodeValue::Message(_) => ValueKind::Message,
            NodeValue::Messages(_) => ValueKind::Messages,
            NodeValue::ToolCall(_) => ValueKind::ToolCall,
            NodeValue::ToolCalls(_) => ValueKind::ToolCalls,
            NodeValue::ToolResult(_) => ValueKind::ToolResult,
            NodeValue::ToolResults(_) => ValueKind::ToolResults,
            NodeValue::List(_) => ValueKind::List,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            NodeValue::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_messages(&self) -> Option<&[Message]> {
        match self {
            NodeValue::Messages(messages) => Some(messages),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            NodeValue::ToolCall(call) => Some(call),
            NodeValue::Message(Message::ToolCall(call)) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            NodeValue::ToolCalls(calls) => Some(calls),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ReceivedToolResult> {
        match self {
            NodeValue::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_tool_results(&self) -> Option<&[ReceivedToolResult]> {
        match self {
            NodeValue::ToolResults(results) => Some(results),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            NodeValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[NodeValue]> {
        match self {
            NodeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Renders the value as the final textual result of an agent run.
    ///
    /// `Unit` has no textual form and yields `None`.
    pub fn into_result_string(self) -> Option<String> {
        match self {
            NodeValue::Unit => None,
            NodeValue::Text(text) => Some(text),
            NodeValue::Json(value) => Some(value.to_string()),
            NodeValue::Message(message) => Some(message.content().to_string()),
            NodeValue::ToolResult(result) => Some(result.content),
            other => serde_json::to_string(&other).ok(),
        }
    }
}

impl From<String> for NodeValue {
    fn from(value: String) -> Self {
        NodeValue::Text(value)
    }
}

impl From<&str> for NodeValue {
    fn from(value: &str) -> Self {
        NodeValue::Text(value.to_string())
    }
}

impl From<Message> for NodeValue {
    fn from(value: Message) -> Self {
        NodeValue::Message(value)
    }
}

impl From<ToolCall> for NodeValue {
    fn from(value: ToolCall) -> Self {
        NodeValue::ToolCall(value)
    }
}

impl From<ReceivedToolResult> for NodeValue {
    fn from(value: ReceivedToolResult) -> Self {
        NodeValue::ToolResult(value)
    }
}

impl From<serde_json::Value> for NodeValue {
    fn from(value: serde_json::Value) -> Self {
        NodeValue::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_fits() {
        assert!(ValueKind::Text.fits(ValueKind::Text));
        assert!(ValueKind::Any.fits(ValueKind::ToolCall));
        assert!(ValueKind::Message.fits(ValueKind::Any));
        assert!(!ValueKind::Text.fits(ValueKind::Message));
    }

    #[test]
    fn test_tool_call_accessor_sees_through_message() {
        let call = ToolCall::new(Some("1".into()), "plus", "{}");
        let wrapped = NodeValue::Message(Message::ToolCall(call.clone()));
        assert_eq!(wrapped.as_tool_call(), Some(&call));
        assert_eq!(wrapped.kind(), ValueKind::Message);
    }

    #[test]
    fn test_into_result_string() {
        assert_eq!(NodeValue::from("done").into_result_string(), Some("done".into()));
        assert_eq!(
            NodeValue::Message(Message::assistant("4")).into_result_string(),
            Some("4".into())
        );
        assert_eq!(
            NodeValue::Json(json!({"a": 1})).into_result_string(),
            Some(r#"{"a":1}"#.into())
        );
        assert_eq!(NodeValue::Unit.into_result_string(), None);
    }
}
