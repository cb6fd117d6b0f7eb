//! Test doubles for exercising strategies without a real provider.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::agent::RunEnvironment;
use crate::core::config::AgentConfig;
use crate::core::context::AgentContext;
use crate::core::feature::FeaturePipeline;
use crate::core::prompt::{Message, Prompt, ToolCall};
use crate::core::session::LLMContext;
use crate::core::tools::descriptor::ToolDescriptor;
use crate::core::tools::registry::ToolRegistry;
use crate::llm::{LLMClient, LLMError, LLModel, TextStream};

/// An [`LLMClient`] replaying scripted turns and recording what it was sent.
///
/// ```rust
/// use stratagem::testing::MockLLMClient;
///
/// let client = MockLLMClient::new()
///     .tool_call("plus", serde_json::json!({"a": 2, "b": 2}))
///     .reply("2 + 2 = 4");
/// ```
#[derive(Default)]
pub struct MockLLMClient {
    script: Mutex<VecDeque<Vec<Message>>>,
    fallback: Option<Vec<Message>>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<Prompt>>,
    offered_tools: Mutex<Vec<Vec<ToolDescriptor>>>,
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one turn made of `messages`.
    pub fn turn(mut self, messages: Vec<Message>) -> Self {
        self.script.get_mut().push_back(messages);
        self
    }

    /// Queues an assistant text reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.turn(vec![Message::assistant(text)])
    }

    /// Queues a single tool call.
    pub fn tool_call(self, tool: impl Into<String>, args: serde_json::Value) -> Self {
        self.turn(vec![Message::ToolCall(ToolCall::new(
            Some(Uuid::new_v4().to_string()),
            tool,
            args.to_string(),
        ))])
    }

    /// Turn replayed once the script is exhausted.
    pub fn with_fallback(mut self, messages: Vec<Message>) -> Self {
        self.fallback = Some(messages);
        self
    }

    /// Sleeps before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received, in order.
    pub async fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().await.clone()
    }

    /// Tool lists offered with each request, in order.
    pub async fn offered_tools(&self) -> Vec<Vec<ToolDescriptor>> {
        self.offered_tools.lock().await.clone()
    }

    async fn next_turn(&self, prompt: &Prompt, tools: &[ToolDescriptor]) -> Result<Vec<Message>, LLMError> {
        self.prompts.lock().await.push(prompt.clone());
        self.offered_tools.lock().await.push(tools.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().await.pop_front();
        scripted
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| LLMError::InvalidResponse("mock script exhausted".to_string()))
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn execute(
        &self,
        prompt: &Prompt,
        _model: &LLModel,
        tools: &[ToolDescriptor],
    ) -> Result<Vec<Message>, LLMError> {
        self.next_turn(prompt, tools).await
    }

    async fn execute_streaming(
        &self,
        prompt: &Prompt,
        _model: &LLModel,
    ) -> Result<TextStream, LLMError> {
        let turn = self.next_turn(prompt, &[]).await?;
        let text: String = turn
            .iter()
            .filter(|m| matches!(m, Message::Assistant { .. }))
            .map(|m| m.content())
            .collect();
        let chunks: Vec<Result<String, LLMError>> = text
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// A context wired to a fresh in-process environment, for driving strategies
/// and sessions directly in tests.
pub fn context_for(
    client: Arc<dyn LLMClient>,
    registry: ToolRegistry,
    config: AgentConfig,
) -> AgentContext {
    let run_id = Uuid::new_v4();
    let registry = Arc::new(registry);
    let pipeline = Arc::new(FeaturePipeline::new());
    let (environment, _result) = RunEnvironment::new(
        run_id,
        Arc::clone(&registry),
        Arc::clone(&pipeline),
        Vec::new(),
    );
    let tools = registry.descriptors();
    let llm = LLMContext::new(
        run_id,
        client,
        registry,
        Arc::clone(&pipeline),
        config.prompt.clone(),
        tools,
        config.model.clone(),
    );
    AgentContext::new("test-agent", llm, Arc::new(environment), pipeline, Arc::new(config))
}
