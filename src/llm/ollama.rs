//! Ollama LLM client for local inference

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::core::prompt::{Message, Prompt, ToolCall, ToolChoice};
use crate::core::tools::descriptor::ToolDescriptor;
use crate::llm::{LLMClient, LLModel, TextStream, error::LLMError};

/// Configuration for Ollama client
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama server URL (default: http://localhost:11434)
    pub host: String,
    /// Per-request timeout. `None` waits as long as the server takes.
    pub timeout: Option<Duration>,
    /// How long the server keeps the model loaded after a request, e.g. `"5m"`.
    pub keep_alive: Option<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            timeout: None,
            keep_alive: None,
        }
    }
}

impl OllamaConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }
}

/// A message in Ollama's chat format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl OllamaMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text("assistant", content)
    }

    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            ..Self::text("tool", content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Options for Ollama generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Request structure for Ollama chat completions
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

/// Response from Ollama's chat endpoint, also one line of a streamed reply
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    #[serde(default)]
    pub model: String,
    pub created_at: Option<DateTime<Utc>>,
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: u32,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub total_duration: u64,
    pub error: Option<String>,
}

/// Model information from Ollama
#[derive(Debug, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    pub modified_at: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f64>>,
}

fn tool_definition(tool: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.to_json_schema(),
        }
    })
}

/// Converts prompt messages to Ollama's chat format. Consecutive tool calls are
/// folded into a single assistant turn.
fn to_ollama_messages(messages: &[Message]) -> Vec<OllamaMessage> {
    let mut converted: Vec<OllamaMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            Message::System { content } => converted.push(OllamaMessage::system(content.as_str())),
            Message::User { content } => converted.push(OllamaMessage::user(content.as_str())),
            Message::Assistant { content } => {
                converted.push(OllamaMessage::assistant(content.as_str()))
            }
            Message::ToolCall(call) => {
                let arguments = call
                    .args()
                    .unwrap_or_else(|_| Value::String(call.content.clone()));
                let tool_call = OllamaToolCall {
                    function: OllamaFunctionCall {
                        name: call.tool.clone(),
                        arguments,
                    },
                };
                let folds = matches!(
                    converted.last(),
                    Some(last) if last.role == "assistant" && !last.tool_calls.is_empty()
                );
                if let (true, Some(last)) = (folds, converted.last_mut()) {
                    last.tool_calls.push(tool_call);
                } else {
                    let mut turn = OllamaMessage::assistant("");
                    turn.tool_calls.push(tool_call);
                    converted.push(turn);
                }
            }
            Message::ToolResult(result) => {
                converted.push(OllamaMessage::tool(result.tool.as_str(), result.content.as_str()))
            }
        }
    }
    converted
}

/// Ollama has no tool choice switch, so the choice is applied to the tool list.
fn offered_tools(prompt: &Prompt, tools: &[ToolDescriptor]) -> Vec<Value> {
    match &prompt.params.tool_choice {
        Some(ToolChoice::None) => Vec::new(),
        Some(ToolChoice::Named(name)) => tools
            .iter()
            .filter(|t| &t.name == name)
            .map(tool_definition)
            .collect(),
        _ => tools.iter().map(tool_definition).collect(),
    }
}

/// Converts a chat reply into engine messages: text first, then one message per tool call.
fn from_ollama_message(message: OllamaMessage) -> Result<Vec<Message>, LLMError> {
    let mut messages = Vec::with_capacity(message.tool_calls.len() + 1);
    if !message.content.trim().is_empty() {
        messages.push(Message::assistant(message.content));
    }
    for call in message.tool_calls {
        let content = match call.function.arguments {
            Value::Null => "{}".to_string(),
            Value::String(raw) => raw,
            other => serde_json::to_string(&other)?,
        };
        messages.push(Message::ToolCall(ToolCall::new(
            Some(Uuid::new_v4().to_string()),
            call.function.name,
            content,
        )));
    }
    if messages.is_empty() {
        return Err(LLMError::EmptyResponse);
    }
    Ok(messages)
}

/// Parses one NDJSON line of a streamed reply. Returns the text delta and
/// whether the server marked the reply as done.
fn parse_stream_line(line: &[u8]) -> Result<Option<(String, bool)>, LLMError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let chunk: OllamaChatResponse = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(LLMError::OllamaError(error));
    }
    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok(Some((text, chunk.done)))
}

type ByteStream = BoxStream<'static, Result<Vec<u8>, LLMError>>;

/// Splits a byte stream into NDJSON lines and yields the non-empty text deltas.
fn ndjson_text_stream(bytes: ByteStream) -> TextStream {
    futures::stream::unfold(
        (bytes, Vec::<u8>::new(), false),
        |(mut bytes, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                let line = match buffer.iter().position(|b| *b == b'\n') {
                    Some(pos) => Some(buffer.drain(..=pos).collect::<Vec<u8>>()),
                    None => match bytes.next().await {
                        Some(Ok(data)) => {
                            buffer.extend_from_slice(&data);
                            None
                        }
                        Some(Err(e)) => return Some((Err(e), (bytes, buffer, true))),
                        // Last line may come without a trailing newline.
                        None => Some(std::mem::take(&mut buffer)),
                    },
                };
                let Some(line) = line else { continue };
                let exhausted = buffer.is_empty() && line.last() != Some(&b'\n');
                match parse_stream_line(&line) {
                    Ok(Some((text, done))) if !text.is_empty() => {
                        return Some((Ok(text), (bytes, buffer, done || exhausted)));
                    }
                    Ok(Some((_, true))) => return None,
                    Ok(_) if exhausted => return None,
                    Ok(_) => continue,
                    Err(e) => return Some((Err(e), (bytes, buffer, true))),
                }
            }
        },
    )
    .boxed()
}

/// [`LLMClient`] talking to an Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, LLMError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host, path)
    }

    fn chat_request(
        &self,
        prompt: &Prompt,
        model: &LLModel,
        tools: &[ToolDescriptor],
        stream: bool,
    ) -> OllamaChatRequest {
        OllamaChatRequest {
            model: model.id.clone(),
            messages: to_ollama_messages(prompt.messages()),
            stream,
            tools: offered_tools(prompt, tools),
            options: prompt.params.temperature.map(|temperature| OllamaOptions {
                temperature: Some(temperature),
            }),
            format: prompt.params.schema.clone(),
            keep_alive: self.config.keep_alive.clone(),
        }
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, LLMError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::OllamaError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }
        Ok(response)
    }

    /// List available models from Ollama
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>, LLMError> {
        let response = self.client.get(self.url("/api/tags")).send().await?;

        if !response.status().is_success() {
            return Err(LLMError::OllamaError(format!(
                "Failed to list models: HTTP {}",
                response.status()
            )));
        }

        let res: OllamaModelsResponse = response.json().await?;
        Ok(res.models)
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn execute(
        &self,
        prompt: &Prompt,
        model: &LLModel,
        tools: &[ToolDescriptor],
    ) -> Result<Vec<Message>, LLMError> {
        let request = self.chat_request(prompt, model, tools, false);
        log::debug!(
            "Ollama chat with {} ({} messages, {} tools)",
            model.id,
            request.messages.len(),
            request.tools.len()
        );
        let response: OllamaChatResponse =
            self.post_json("/api/chat", &request).await?.json().await?;
        if let Some(error) = response.error {
            return Err(LLMError::OllamaError(error));
        }
        log::trace!(
            "Ollama reply: {} prompt tokens, {} completion tokens",
            response.prompt_eval_count,
            response.eval_count
        );
        let message = response
            .message
            .ok_or_else(|| LLMError::InvalidResponse("chat reply without a message".to_string()))?;
        from_ollama_message(message)
    }

    async fn execute_streaming(
        &self,
        prompt: &Prompt,
        model: &LLModel,
    ) -> Result<TextStream, LLMError> {
        let request = self.chat_request(prompt, model, &[], true);
        let response = self.post_json("/api/chat", &request).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(LLMError::from))
            .boxed();
        Ok(ndjson_text_stream(bytes))
    }

    async fn embed(&self, text: &str, model: &LLModel) -> Result<Vec<f64>, LLMError> {
        let body = json!({ "model": model.id, "input": text });
        let response: OllamaEmbedResponse =
            self.post_json("/api/embed", &body).await?.json().await?;
        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::InvalidResponse("no embedding returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prompt::ToolResultMessage;
    use crate::core::tools::descriptor::ToolParameterType;

    #[test]
    fn test_ollama_message_constructors() {
        let system = OllamaMessage::system("You are helpful");
        assert_eq!(system.role, "system");

        let tool = OllamaMessage::tool("plus", "4");
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_name.as_deref(), Some("plus"));
    }

    #[test]
    fn test_consecutive_tool_calls_share_a_turn() {
        let messages = vec![
            Message::user("add things"),
            Message::ToolCall(ToolCall::new(None, "plus", r#"{"a":1,"b":2}"#)),
            Message::ToolCall(ToolCall::new(None, "plus", r#"{"a":3,"b":4}"#)),
            Message::ToolResult(ToolResultMessage {
                id: None,
                tool: "plus".into(),
                content: "3".into(),
            }),
        ];
        let converted = to_ollama_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1].tool_calls.len(), 2);
        assert_eq!(converted[1].tool_calls[1].function.arguments["b"], 4);
        assert_eq!(converted[2].role, "tool");
    }

    #[test]
    fn test_reply_with_text_and_tool_call() {
        let reply: OllamaMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": "Let me add that.",
            "tool_calls": [{"function": {"name": "plus", "arguments": {"a": 2, "b": 2}}}]
        }))
        .unwrap();
        let messages = from_ollama_message(reply).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content(), "Let me add that.");
        let call = messages[1].as_tool_call().unwrap();
        assert_eq!(call.tool, "plus");
        assert_eq!(call.args().unwrap()["a"], 2);
        assert!(call.id.is_some());

        let empty = OllamaMessage::assistant("  ");
        assert!(matches!(from_ollama_message(empty), Err(LLMError::EmptyResponse)));
    }

    #[test]
    fn test_tool_choice_narrows_offered_tools() {
        let tools = vec![
            ToolDescriptor::new("plus", "Adds").required("a", "left", ToolParameterType::Integer),
            ToolDescriptor::new("minus", "Subtracts"),
        ];
        let auto = Prompt::new("p");
        assert_eq!(offered_tools(&auto, &tools).len(), 2);

        let named = auto.update(|p| {
            p.tool_choice(ToolChoice::Named("minus".into()));
        });
        let offered = offered_tools(&named, &tools);
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0]["function"]["name"], "minus");

        let none = auto.update(|p| {
            p.tool_choice(ToolChoice::None);
        });
        assert!(offered_tools(&none, &tools).is_empty());
    }

    #[tokio::test]
    async fn test_ndjson_stream_splits_across_chunks() {
        let raw = concat!(
            r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"lo"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":""},"done":true}"#,
            "\n"
        );
        let (first, second) = raw.as_bytes().split_at(25);
        let bytes: ByteStream =
            futures::stream::iter(vec![Ok(first.to_vec()), Ok(second.to_vec())]).boxed();
        let chunks: Vec<String> = ndjson_text_stream(bytes)
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_ndjson_stream_surfaces_server_error() {
        let bytes: ByteStream =
            futures::stream::iter(vec![Ok(br#"{"error":"model not found"}"#.to_vec())]).boxed();
        let chunks: Vec<Result<String, LLMError>> = ndjson_text_stream(bytes).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], Err(LLMError::OllamaError(m)) if m == "model not found"));
    }
}
