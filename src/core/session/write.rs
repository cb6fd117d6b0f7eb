use std::sync::Arc;

use futures::StreamExt;
use serde::de::DeserializeOwned;

use super::context::{LLMState, SessionServices};
use super::structured::{
    FIXING_SYSTEM_PROMPT, StructuredRequestConfig, StructuredResponse, parse_structured,
};
use super::{SessionState, SessionStatus};
use crate::core::agent::dispatch::ToolDispatcher;
use crate::core::agent::message::ToolCallContent;
use crate::core::error::AgentError;
use crate::core::feature::events::{AfterLLMCallEvent, BeforeLLMCallEvent};
use crate::core::prompt::{Message, Prompt, PromptBuilder, ToolChoice};
use crate::core::tools::descriptor::ToolDescriptor;
use crate::core::tools::result::ReceivedToolResult;
use crate::core::tools::safe::{SafeTool, SafeToolResult};
use crate::core::tools::tool::Tool;
use crate::llm::{LLMError, LLModel, TextStream};

/// Exclusive, mutable view over the prompt of one run.
///
/// Obtained through [`LLMContext::write_session`](super::LLMContext::write_session).
/// Prompt updates are copy-on-write: snapshots taken earlier through
/// [`prompt`](Self::prompt) stay unchanged.
pub struct LLMWriteSession {
    status: SessionStatus,
    prompt: Prompt,
    tools: Vec<ToolDescriptor>,
    model: LLModel,
    services: Arc<SessionServices>,
}

impl LLMWriteSession {
    pub(crate) fn new(state: LLMState, services: Arc<SessionServices>) -> Self {
        Self {
            status: SessionStatus::open(),
            prompt: state.prompt,
            tools: state.tools,
            model: state.model,
            services,
        }
    }

    /// Closes the session and hands back its state for publishing.
    pub(crate) fn close(self) -> LLMState {
        self.status.close();
        LLMState {
            prompt: self.prompt,
            tools: self.tools,
            model: self.model,
        }
    }

    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    // ========================================
    // Accessors
    // ========================================

    pub fn prompt(&self) -> Result<&Prompt, AgentError> {
        self.status.ensure_open()?;
        Ok(&self.prompt)
    }

    pub fn tools(&self) -> Result<&[ToolDescriptor], AgentError> {
        self.status.ensure_open()?;
        Ok(&self.tools)
    }

    pub fn model(&self) -> Result<&LLModel, AgentError> {
        self.status.ensure_open()?;
        Ok(&self.model)
    }

    // ========================================
    // Prompt and configuration
    // ========================================

    /// Appends messages to the prompt.
    pub fn update_prompt<F>(&mut self, edit: F) -> Result<(), AgentError>
    where
        F: FnOnce(&mut PromptBuilder),
    {
        self.status.ensure_open()?;
        self.prompt = self.prompt.update(edit);
        Ok(())
    }

    /// Replaces the prompt with whatever `rewrite` derives from the current one.
    pub fn rewrite_prompt<F>(&mut self, rewrite: F) -> Result<(), AgentError>
    where
        F: FnOnce(&Prompt) -> Prompt,
    {
        self.status.ensure_open()?;
        self.prompt = rewrite(&self.prompt);
        Ok(())
    }

    pub fn change_model(&mut self, model: LLModel) -> Result<(), AgentError> {
        self.status.ensure_open()?;
        log::debug!("Switching session model from {} to {}", self.model, model);
        self.model = model;
        Ok(())
    }

    pub fn set_tools(&mut self, tools: Vec<ToolDescriptor>) -> Result<(), AgentError> {
        self.status.ensure_open()?;
        self.tools = tools;
        Ok(())
    }

    pub fn set_tool_choice(&mut self, choice: Option<ToolChoice>) -> Result<(), AgentError> {
        self.status.ensure_open()?;
        let mut params = self.prompt.params.clone();
        params.tool_choice = choice;
        self.prompt = self.prompt.with_params(params);
        Ok(())
    }

    // ========================================
    // LLM requests
    // ========================================

    /// Sends the prompt with the session tools and appends every response.
    ///
    /// Returns the first tool call of the turn if there is one, otherwise the
    /// first response. Narration emitted next to a call stays in the prompt.
    pub async fn request_llm(&mut self) -> Result<Message, AgentError> {
        let tools = self.tools()?.to_vec();
        let prompt = self.prompt.clone();
        primary_response(self.request_and_append(prompt, tools).await?)
    }

    /// Same as [`request_llm`](Self::request_llm), but no tools are offered.
    pub async fn request_llm_without_tools(&mut self) -> Result<Message, AgentError> {
        self.status.ensure_open()?;
        let prompt = self.prompt.clone();
        first_response(self.request_and_append(prompt, Vec::new()).await?)
    }

    /// Forces the model to answer with a tool call for this request only.
    pub async fn request_llm_only_calling_tools(&mut self) -> Result<Message, AgentError> {
        let tools = self.tools()?.to_vec();
        let mut params = self.prompt.params.clone();
        params.tool_choice = Some(ToolChoice::Required);
        let prompt = self.prompt.with_params(params);
        primary_response(self.request_and_append(prompt, tools).await?)
    }

    /// Sends the prompt with the session tools and returns all responses,
    /// e.g. several tool calls emitted in one turn.
    pub async fn request_llm_multiple(&mut self) -> Result<Vec<Message>, AgentError> {
        let tools = self.tools()?.to_vec();
        let prompt = self.prompt.clone();
        self.request_and_append(prompt, tools).await
    }

    /// Streams the reply as text chunks. Nothing is appended to the prompt;
    /// callers that want the reply in history append it themselves.
    ///
    /// The after-call hook fires with the collected text once the stream is
    /// drained. A stream dropped early reports nothing.
    pub async fn request_llm_streaming(&self) -> Result<TextStream, AgentError> {
        self.status.ensure_open()?;
        self.services
            .pipeline
            .on_before_llm_call(BeforeLLMCallEvent {
                run_id: self.services.run_id,
                prompt: self.prompt.clone(),
                model: self.model.clone(),
                tools: Vec::new(),
            })
            .await;
        let inner = self
            .services
            .client
            .execute_streaming(&self.prompt, &self.model)
            .await?;

        let state = StreamingCall {
            inner,
            collected: String::new(),
            services: Arc::clone(&self.services),
            model: self.model.clone(),
        };
        let stream = futures::stream::unfold(state, |mut state| async move {
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.collected.push_str(&chunk);
                    Some((Ok(chunk), state))
                }
                Some(Err(e)) => Some((Err(e), state)),
                None => {
                    state.finish().await;
                    None
                }
            }
        });
        Ok(stream.boxed())
    }

    /// Requests a reply without tools and decodes it into `T`.
    ///
    /// When decoding fails the raw text is sent to the fixing model (the session
    /// model unless configured otherwise) up to `config.retries` times. Repair
    /// rounds are not recorded in the prompt; the original reply is.
    pub async fn request_llm_structured<T: DeserializeOwned>(
        &mut self,
        config: StructuredRequestConfig,
    ) -> Result<StructuredResponse<T>, AgentError> {
        self.status.ensure_open()?;
        let mut prompt = self.prompt.clone();
        if let Some(instructions) = &config.instructions {
            prompt = prompt.update(|p| {
                p.user(instructions.clone());
            });
        }
        let response = first_response(self.request_and_append(prompt, Vec::new()).await?)?;

        let mut raw = response.content().to_string();
        let mut attempts = 1;
        loop {
            match parse_structured::<T>(&raw) {
                Ok(structure) => return Ok(StructuredResponse { structure, raw }),
                Err(e) if attempts > config.retries => {
                    log::warn!("Structured output still malformed after {} attempt(s)", attempts);
                    return Err(AgentError::StructuredOutput {
                        attempts,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    log::debug!("Structured output attempt {} failed: {}", attempts, e);
                    raw = self.fix_structured_output(&raw, &e.to_string(), &config).await?;
                    attempts += 1;
                }
            }
        }
    }

    async fn fix_structured_output(
        &self,
        raw: &str,
        error: &str,
        config: &StructuredRequestConfig,
    ) -> Result<String, AgentError> {
        let model = config
            .fixing_model
            .clone()
            .unwrap_or_else(|| self.model.clone());
        let prompt = Prompt::new(format!("{}-fix", self.prompt.id)).update(|p| {
            p.system(FIXING_SYSTEM_PROMPT).user(format!(
                "This output could not be parsed ({}):\n\n{}",
                error, raw
            ));
        });
        let responses = self.execute(&prompt, &model, Vec::new()).await?;
        Ok(first_response(responses)?.content().to_string())
    }

    // ========================================
    // Tools
    // ========================================

    /// Runs the registered tool of type `T` through [`SafeTool`].
    /// The prompt is not touched.
    pub async fn call_tool<T: Tool>(
        &self,
        args: T::Args,
    ) -> Result<SafeToolResult<T::Output>, AgentError> {
        self.status.ensure_open()?;
        let tool = self
            .services
            .registry
            .get_tool::<T>()
            .ok_or_else(|| AgentError::ToolNotFound(std::any::type_name::<T>().to_string()))?;
        Ok(SafeTool::new(tool).execute(args).await)
    }

    /// Runs a registered tool by name with raw JSON arguments.
    ///
    /// Goes through the same dispatcher as model tool calls, so outcomes are
    /// classified the same way and tool hooks fire. The prompt is not touched.
    pub async fn call_tool_by_name(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ReceivedToolResult, AgentError> {
        self.status.ensure_open()?;
        let services = &self.services;
        if services.registry.get_tool_by_name(name).is_none() {
            return Err(AgentError::ToolNotFound(name.to_string()));
        }
        let dispatcher = ToolDispatcher::new(
            services.run_id,
            Arc::clone(&services.registry),
            Arc::clone(&services.pipeline),
        );
        Ok(dispatcher
            .dispatch(ToolCallContent::new(None, name, args))
            .await)
    }

    // ========================================
    // Internals
    // ========================================

    async fn request_and_append(
        &mut self,
        prompt: Prompt,
        tools: Vec<ToolDescriptor>,
    ) -> Result<Vec<Message>, AgentError> {
        self.status.ensure_open()?;
        let responses = self.execute(&prompt, &self.model, tools).await?;
        self.prompt = self.prompt.update(|p| {
            p.messages(responses.iter().cloned());
        });
        Ok(responses)
    }

    async fn execute(
        &self,
        prompt: &Prompt,
        model: &LLModel,
        tools: Vec<ToolDescriptor>,
    ) -> Result<Vec<Message>, AgentError> {
        let services = &self.services;
        services
            .pipeline
            .on_before_llm_call(BeforeLLMCallEvent {
                run_id: services.run_id,
                prompt: prompt.clone(),
                model: model.clone(),
                tools: tools.clone(),
            })
            .await;

        let responses = services.client.execute(prompt, model, &tools).await?;
        if responses.is_empty() {
            return Err(LLMError::EmptyResponse.into());
        }
        log::debug!("{} returned {} response(s)", model, responses.len());

        services
            .pipeline
            .on_after_llm_call(AfterLLMCallEvent {
                run_id: services.run_id,
                model: model.clone(),
                responses: responses.clone(),
            })
            .await;
        Ok(responses)
    }
}

/// A streaming request waiting for its stream to be drained.
struct StreamingCall {
    inner: TextStream,
    collected: String,
    services: Arc<SessionServices>,
    model: LLModel,
}

impl StreamingCall {
    async fn finish(self) {
        log::debug!("{} streamed {} byte(s)", self.model, self.collected.len());
        self.services
            .pipeline
            .on_after_llm_call(AfterLLMCallEvent {
                run_id: self.services.run_id,
                model: self.model,
                responses: vec![Message::assistant(self.collected)],
            })
            .await;
    }
}

/// First tool call of the turn, else the first response.
fn primary_response(mut responses: Vec<Message>) -> Result<Message, AgentError> {
    match responses.iter().position(|m| m.as_tool_call().is_some()) {
        Some(idx) => Ok(responses.swap_remove(idx)),
        None => first_response(responses),
    }
}

fn first_response(responses: Vec<Message>) -> Result<Message, AgentError> {
    responses
        .into_iter()
        .next()
        .ok_or(AgentError::Llm(LLMError::EmptyResponse))
}
