//! Prompt and message model shared by the graph, the sessions and the providers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back in the matching result.
    pub id: Option<String>,
    /// Name of the tool to invoke.
    pub tool: String,
    /// Raw JSON arguments as produced by the model.
    pub content: String,
}

impl ToolCall {
    pub fn new(id: Option<String>, tool: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            tool: tool.into(),
            content: content.into(),
        }
    }

    /// Parses [`content`](ToolCall::content) into a JSON value.
    ///
    /// Empty content is read as an empty object.
    pub fn args(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.content.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.content)
    }
}

/// Result of a tool call as it is fed back into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub id: Option<String>,
    pub tool: String,
    pub content: String,
}

/// A single entry of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    ToolCall(ToolCall),
    ToolResult(ToolResultMessage),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
        }
    }

    /// The textual content, or the raw arguments for a tool call.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content } => content,
            Message::ToolCall(call) => &call.content,
            Message::ToolResult(result) => &result.content,
        }
    }

    /// Whether this message can come back from a provider.
    pub fn is_response(&self) -> bool {
        matches!(self, Message::Assistant { .. } | Message::ToolCall(_))
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Message::ToolCall(call) => Some(call),
            _ => None,
        }
    }
}

/// How the model is allowed to pick tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "tool", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Required,
    None,
    Named(String),
}

/// Model parameters carried with a prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMParams {
    pub temperature: Option<f64>,
    pub tool_choice: Option<ToolChoice>,
    /// Response schema hint forwarded to providers that support it.
    pub schema: Option<serde_json::Value>,
}

/// An immutable snapshot of a conversation.
///
/// Updates never mutate a prompt in place: [`Prompt::update`] returns a new value
/// so anybody holding an older snapshot keeps a consistent view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    messages: Arc<Vec<Message>>,
    pub params: LLMParams,
}

impl Prompt {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Arc::new(Vec::new()),
            params: LLMParams::default(),
        }
    }

    /// An empty prompt with a random id.
    pub fn empty() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn builder(id: impl Into<String>) -> PromptBuilder {
        PromptBuilder::from_prompt(&Self::new(id))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns a new prompt with the messages appended by `edit`.
    pub fn update<F>(&self, edit: F) -> Prompt
    where
        F: FnOnce(&mut PromptBuilder),
    {
        let mut builder = PromptBuilder::from_prompt(self);
        edit(&mut builder);
        builder.build()
    }

    /// Returns a new prompt with the same id and params but different messages.
    pub fn with_messages(&self, messages: Vec<Message>) -> Prompt {
        Prompt {
            id: self.id.clone(),
            messages: Arc::new(messages),
            params: self.params.clone(),
        }
    }

    pub fn with_params(&self, params: LLMParams) -> Prompt {
        Prompt {
            id: self.id.clone(),
            messages: Arc::clone(&self.messages),
            params,
        }
    }
}

/// Appends messages on top of an existing prompt.
pub struct PromptBuilder {
    id: String,
    messages: Vec<Message>,
    params: LLMParams,
}

impl PromptBuilder {
    fn from_prompt(prompt: &Prompt) -> Self {
        Self {
            id: prompt.id.clone(),
            messages: prompt.messages.as_ref().clone(),
            params: prompt.params.clone(),
        }
    }

    pub fn system(&mut self, content: impl Into<String>) -> &mut Self {
        self.message(Message::system(content))
    }

    pub fn user(&mut self, content: impl Into<String>) -> &mut Self {
        self.message(Message::user(content))
    }

    pub fn assistant(&mut self, content: impl Into<String>) -> &mut Self {
        self.message(Message::assistant(content))
    }

    pub fn tool_call(&mut self, call: ToolCall) -> &mut Self {
        self.message(Message::ToolCall(call))
    }

    pub fn tool_result(&mut self, result: ToolResultMessage) -> &mut Self {
        self.message(Message::ToolResult(result))
    }

    pub fn message(&mut self, message: Message) -> &mut Self {
        self.messages.push(message);
        self
    }

    pub fn messages(&mut self, messages: impl IntoIterator<Item = Message>) -> &mut Self {
        self.messages.extend(messages);
        self
    }

    pub fn temperature(&mut self, temperature: f64) -> &mut Self {
        self.params.temperature = Some(temperature);
        self
    }

    pub fn tool_choice(&mut self, choice: ToolChoice) -> &mut Self {
        self.params.tool_choice = Some(choice);
        self
    }

    pub fn build(self) -> Prompt {
        Prompt {
            id: self.id,
            messages: Arc::new(self.messages),
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_keeps_previous_snapshot() {
        let mut builder = Prompt::builder("p");
        builder.system("be terse").user("hi");
        let first = builder.build();

        let second = first.update(|p| {
            p.assistant("hello");
        });

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 3);
        assert_eq!(&second.messages()[..2], first.messages());
        assert_eq!(second.messages()[2], Message::assistant("hello"));
        assert_eq!(second.id, "p");
    }

    #[test]
    fn test_tool_call_args() {
        let call = ToolCall::new(None, "plus", r#"{"a": 2, "b": 2}"#);
        assert_eq!(call.args().unwrap()["a"], 2);

        let empty = ToolCall::new(None, "noop", "  ");
        assert!(empty.args().unwrap().as_object().unwrap().is_empty());

        let broken = ToolCall::new(None, "plus", "{a:");
        assert!(broken.args().is_err());
    }

    #[test]
    fn test_message_roles_serialize() {
        let json = serde_json::to_value(Message::user("x")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(Message::assistant("x").is_response());
        assert!(!Message::system("x").is_response());
    }
}
