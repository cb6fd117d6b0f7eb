use std::sync::Arc;

use crate::core::prompt::{Message, ToolCall};
use crate::core::value::{NodeValue, ValueKind};

type Predicate = Arc<dyn Fn(&NodeValue) -> bool + Send + Sync>;
type Transform = Arc<dyn Fn(NodeValue) -> NodeValue + Send + Sync>;

#[derive(Clone)]
enum EdgeStep {
    Filter {
        accepts: ValueKind,
        predicate: Predicate,
    },
    Map {
        accepts: ValueKind,
        produces: ValueKind,
        transform: Transform,
    },
}

/// A guarded transition to another node.
///
/// An edge is a chain of steps applied to the source node's output in order:
/// filters may reject the value, transforms convert it. The edge is taken when
/// every filter passes, and the transformed value becomes the target's input.
///
/// ```rust
/// use stratagem::prelude::*;
///
/// let to_tool = Edge::forward_to("execute_tool").on_tool_call_named("plus");
/// let to_finish = Edge::forward_to(FINISH).on_assistant_message(|_| true);
/// assert_eq!(to_tool.target(), "execute_tool");
/// # let _ = to_finish;
/// ```
#[derive(Clone)]
pub struct Edge {
    target: String,
    steps: Vec<EdgeStep>,
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("target", &self.target)
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl Edge {
    /// An unconditional edge to `target`.
    pub fn forward_to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            steps: Vec::new(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn filter(mut self, accepts: ValueKind, predicate: impl Fn(&NodeValue) -> bool + Send + Sync + 'static) -> Self {
        self.steps.push(EdgeStep::Filter {
            accepts,
            predicate: Arc::new(predicate),
        });
        self
    }

    fn map(
        mut self,
        accepts: ValueKind,
        produces: ValueKind,
        transform: impl Fn(NodeValue) -> NodeValue + Send + Sync + 'static,
    ) -> Self {
        self.steps.push(EdgeStep::Map {
            accepts,
            produces,
            transform: Arc::new(transform),
        });
        self
    }

    /// Takes the edge only when `predicate` holds for the value.
    pub fn on_condition(self, predicate: impl Fn(&NodeValue) -> bool + Send + Sync + 'static) -> Self {
        self.filter(ValueKind::Any, predicate)
    }

    /// Converts the value; `produces` declares the resulting kind.
    pub fn transformed(
        self,
        produces: ValueKind,
        transform: impl Fn(NodeValue) -> NodeValue + Send + Sync + 'static,
    ) -> Self {
        self.map(ValueKind::Any, produces, transform)
    }

    /// Matches a tool-call message satisfying `predicate` and forwards the call.
    pub fn on_tool_call(self, predicate: impl Fn(&ToolCall) -> bool + Send + Sync + 'static) -> Self {
        self.filter(ValueKind::Message, move |value| {
            matches!(value, NodeValue::Message(Message::ToolCall(call)) if predicate(call))
        })
        .map(ValueKind::Message, ValueKind::ToolCall, |value| match value {
            NodeValue::Message(Message::ToolCall(call)) => NodeValue::ToolCall(call),
            other => other,
        })
    }

    pub fn on_tool_call_named(self, tool: impl Into<String>) -> Self {
        let tool = tool.into();
        self.on_tool_call(move |call| call.tool == tool)
    }

    /// Matches a batch holding at least one tool call and forwards only the
    /// calls. Assistant text in the same turn stays in the prompt.
    pub fn on_multiple_tool_calls(
        self,
        predicate: impl Fn(&[ToolCall]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter(ValueKind::Messages, move |value| match value {
            NodeValue::Messages(messages) => {
                let calls: Vec<ToolCall> = messages
                    .iter()
                    .filter_map(|m| m.as_tool_call().cloned())
                    .collect();
                !calls.is_empty() && predicate(&calls)
            }
            _ => false,
        })
        .map(ValueKind::Messages, ValueKind::ToolCalls, |value| match value {
            NodeValue::Messages(messages) => NodeValue::ToolCalls(
                messages
                    .into_iter()
                    .filter_map(|m| match m {
                        Message::ToolCall(call) => Some(call),
                        _ => None,
                    })
                    .collect(),
            ),
            other => other,
        })
    }

    /// Matches an assistant text reply satisfying `predicate` and forwards its text.
    pub fn on_assistant_message(self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.filter(ValueKind::Message, move |value| {
            matches!(value, NodeValue::Message(Message::Assistant { content }) if predicate(content))
        })
        .map(ValueKind::Message, ValueKind::Text, |value| match value {
            NodeValue::Message(Message::Assistant { content }) => NodeValue::Text(content),
            other => other,
        })
    }

    /// Matches a batch without tool calls whose assistant text satisfies
    /// `predicate`, and forwards that text.
    pub fn on_multiple_assistant_messages(
        self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter(ValueKind::Messages, move |value| match value {
            NodeValue::Messages(messages) => {
                !messages.iter().any(|m| m.as_tool_call().is_some())
                    && messages
                        .iter()
                        .any(|m| matches!(m, Message::Assistant { .. }))
                    && predicate(&assistant_text(messages))
            }
            _ => false,
        })
        .map(ValueKind::Messages, ValueKind::Text, |value| match value {
            NodeValue::Messages(messages) => NodeValue::Text(assistant_text(&messages)),
            other => other,
        })
    }

    /// Applies every step. `None` means a filter rejected the value.
    pub(crate) fn traverse(&self, mut value: NodeValue) -> Option<NodeValue> {
        for step in &self.steps {
            match step {
                EdgeStep::Filter { predicate, .. } => {
                    if !predicate(&value) {
                        return None;
                    }
                }
                EdgeStep::Map { transform, .. } => value = transform(value),
            }
        }
        Some(value)
    }

    /// Kind of the value this edge delivers when fed `source` values, or a
    /// description of the first step that cannot accept it.
    pub(crate) fn delivered_kind(&self, source: ValueKind) -> Result<ValueKind, String> {
        let mut current = source;
        for (idx, step) in self.steps.iter().enumerate() {
            let (accepts, produces) = match step {
                EdgeStep::Filter { accepts, .. } => (*accepts, None),
                EdgeStep::Map {
                    accepts, produces, ..
                } => (*accepts, Some(*produces)),
            };
            if !current.fits(accepts) {
                return Err(format!(
                    "step {} expects {} but receives {}",
                    idx + 1,
                    accepts,
                    current
                ));
            }
            current = match produces {
                Some(kind) => kind,
                None if current == ValueKind::Any => accepts,
                None => current,
            };
        }
        Ok(current)
    }
}

fn assistant_text(messages: &[Message]) -> String {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Assistant { content } => Some(content.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_call_message(tool: &str) -> NodeValue {
        NodeValue::Message(Message::ToolCall(ToolCall::new(None, tool, "{}")))
    }

    #[test]
    fn test_on_tool_call_narrows_to_call() {
        let edge = Edge::forward_to("exec").on_tool_call_named("plus");
        match edge.traverse(tool_call_message("plus")) {
            Some(NodeValue::ToolCall(call)) => assert_eq!(call.tool, "plus"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(edge.traverse(tool_call_message("minus")).is_none());
        assert!(edge.traverse(Message::assistant("hi").into()).is_none());
    }

    #[test]
    fn test_multiple_tool_calls_forwards_only_calls() {
        let edge = Edge::forward_to("exec").on_multiple_tool_calls(|calls| calls.len() == 2);
        let calls = NodeValue::Messages(vec![
            Message::ToolCall(ToolCall::new(None, "a", "{}")),
            Message::ToolCall(ToolCall::new(None, "b", "{}")),
        ]);
        assert_eq!(
            edge.traverse(calls).map(|v| v.kind()),
            Some(ValueKind::ToolCalls)
        );

        let any = Edge::forward_to("exec").on_multiple_tool_calls(|_| true);
        let mixed = NodeValue::Messages(vec![
            Message::assistant("thinking"),
            Message::ToolCall(ToolCall::new(None, "a", "{}")),
        ]);
        match any.traverse(mixed) {
            Some(NodeValue::ToolCalls(calls)) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].tool, "a");
            }
            other => panic!("unexpected {:?}", other),
        }

        let text_only = NodeValue::Messages(vec![Message::assistant("done")]);
        assert!(any.traverse(text_only).is_none());
    }

    #[test]
    fn test_delivered_kind() {
        let edge = Edge::forward_to("x").on_assistant_message(|_| true);
        assert_eq!(edge.delivered_kind(ValueKind::Message), Ok(ValueKind::Text));
        assert_eq!(edge.delivered_kind(ValueKind::Any), Ok(ValueKind::Text));
        assert!(edge.delivered_kind(ValueKind::ToolResult).is_err());

        let plain = Edge::forward_to("x").on_condition(|_| true);
        assert_eq!(plain.delivered_kind(ValueKind::Json), Ok(ValueKind::Json));
    }
}
