use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesOrdered, StreamExt};
use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

use super::environment::{AgentEnvironment, ErrorHandler};
use super::message::*;
use crate::core::error::AgentError;
use crate::core::feature::FeaturePipeline;
use crate::core::feature::events::{
    ToolCallEvent, ToolCallFailureEvent, ToolCallResultEvent, ToolValidationErrorEvent,
};
use crate::core::prompt::ToolCall;
use crate::core::tools::registry::{ToolRegistry, ToolStage};
use crate::core::tools::result::{ReceivedToolResult, ToolOutcome};
use crate::core::tools::safe::SafeToolResult;

/// Resolves and runs tool calls against a registry.
///
/// Never fails: unknown tools, undecodable arguments and tool errors all come
/// back as a [`ReceivedToolResult`] the model can read.
#[derive(Clone)]
pub struct ToolDispatcher {
    run_id: Uuid,
    registry: Arc<ToolRegistry>,
    pipeline: Arc<FeaturePipeline>,
}

impl ToolDispatcher {
    pub fn new(run_id: Uuid, registry: Arc<ToolRegistry>, pipeline: Arc<FeaturePipeline>) -> Self {
        Self {
            run_id,
            registry,
            pipeline,
        }
    }

    /// Explicit stage, else the first stage declaring the tool, else the default stage.
    fn resolve_stage(&self, content: &ToolCallContent) -> Option<&ToolStage> {
        match &content.stage {
            Some(stage) => self.registry.stage_by_name(stage),
            None => self
                .registry
                .stage_by_tool_name(&content.tool_name)
                .or_else(|| self.registry.default_stage()),
        }
    }

    pub async fn dispatch(&self, content: ToolCallContent) -> ReceivedToolResult {
        let ToolCallContent {
            tool_call_id,
            tool_name,
            tool_args,
            ..
        } = content.clone();

        let Some(registered) = self
            .resolve_stage(&content)
            .and_then(|stage| stage.get_tool(&tool_name))
        else {
            log::warn!("Model called unknown tool '{}'", tool_name);
            return ReceivedToolResult {
                content: format!("Tool with name '{}' not found", tool_name),
                id: tool_call_id,
                tool: tool_name,
                outcome: ToolOutcome::NotFound,
                result: None,
            };
        };

        let args = match registered.tool.decode_args(tool_args.clone()) {
            Ok(args) => args,
            Err(e) => {
                log::warn!("Failed to decode arguments for tool '{}': {}", tool_name, e);
                return decode_failure(tool_call_id, tool_name, &e);
            }
        };

        self.pipeline
            .on_tool_call(ToolCallEvent {
                run_id: self.run_id,
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                tool_args: tool_args.clone(),
            })
            .await;

        log::debug!("Executing tool '{}'", tool_name);
        let (outcome, content, result) = match registered.tool.execute_erased(args).await {
            SafeToolResult::Success { result, content } => {
                self.pipeline
                    .on_tool_call_result(ToolCallResultEvent {
                        run_id: self.run_id,
                        tool_call_id: tool_call_id.clone(),
                        tool_name: tool_name.clone(),
                        tool_args,
                        result: content.clone(),
                    })
                    .await;
                (ToolOutcome::Success, content, Some(result))
            }
            SafeToolResult::ValidationFailure { message } => {
                self.pipeline
                    .on_tool_validation_error(ToolValidationErrorEvent {
                        run_id: self.run_id,
                        tool_call_id: tool_call_id.clone(),
                        tool_name: tool_name.clone(),
                        tool_args,
                        error: message.clone(),
                    })
                    .await;
                (ToolOutcome::ValidationFailure, message, None)
            }
            SafeToolResult::Failure { message } => {
                self.pipeline
                    .on_tool_call_failure(ToolCallFailureEvent {
                        run_id: self.run_id,
                        tool_call_id: tool_call_id.clone(),
                        tool_name: tool_name.clone(),
                        tool_args,
                        error: message.clone(),
                    })
                    .await;
                (ToolOutcome::Failure, message, None)
            }
        };

        ReceivedToolResult {
            id: tool_call_id,
            tool: tool_name,
            content,
            outcome,
            result,
        }
    }

    /// Runs every call concurrently and returns the results in input order.
    pub async fn dispatch_all(&self, calls: Vec<ToolCallContent>) -> Vec<ReceivedToolResult> {
        let mut pending: FuturesOrdered<_> =
            calls.into_iter().map(|call| self.dispatch(call)).collect();
        let mut results = Vec::with_capacity(pending.len());
        while let Some(result) = pending.next().await {
            results.push(result);
        }
        results
    }

    /// Parses the raw arguments of a model tool call, then dispatches it.
    pub async fn dispatch_call(&self, call: ToolCall) -> ReceivedToolResult {
        match call.args() {
            Ok(args) => {
                self.dispatch(ToolCallContent::new(call.id, call.tool, args))
                    .await
            }
            Err(e) => decode_failure(call.id, call.tool, &e),
        }
    }

    pub async fn dispatch_calls(&self, calls: Vec<ToolCall>) -> Vec<ReceivedToolResult> {
        let mut pending: FuturesOrdered<_> = calls
            .into_iter()
            .map(|call| self.dispatch_call(call))
            .collect();
        let mut results = Vec::with_capacity(pending.len());
        while let Some(result) = pending.next().await {
            results.push(result);
        }
        results
    }
}

fn decode_failure(id: Option<String>, tool: String, error: &dyn std::fmt::Display) -> ReceivedToolResult {
    ReceivedToolResult {
        content: format!("Failed to parse arguments for tool '{}': {}", tool, error),
        id,
        tool,
        outcome: ToolOutcome::DecodeFailure,
        result: None,
    }
}

/// Where a run stands with respect to its environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Running,
    Terminated,
}

/// The in-process environment of one run.
///
/// Handles tool calls through a [`ToolDispatcher`], offers errors to the
/// registered [`ErrorHandler`]s and completes the run result exactly once.
pub struct RunEnvironment {
    run_id: Uuid,
    dispatcher: ToolDispatcher,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
    phase: Mutex<RunPhase>,
    result: Mutex<Option<oneshot::Sender<Option<String>>>>,
}

impl RunEnvironment {
    /// Returns the environment and the receiving end of the run result.
    pub fn new(
        run_id: Uuid,
        registry: Arc<ToolRegistry>,
        pipeline: Arc<FeaturePipeline>,
        error_handlers: Vec<Arc<dyn ErrorHandler>>,
    ) -> (Self, oneshot::Receiver<Option<String>>) {
        let (tx, rx) = oneshot::channel();
        let environment = Self {
            run_id,
            dispatcher: ToolDispatcher::new(run_id, registry, pipeline),
            error_handlers,
            phase: Mutex::new(RunPhase::Init),
            result: Mutex::new(Some(tx)),
        };
        (environment, rx)
    }

    pub async fn phase(&self) -> RunPhase {
        *self.phase.lock().await
    }

    /// Handles one message from the strategy and produces the reply.
    pub async fn process(
        &self,
        message: AgentToEnvironment,
    ) -> Result<EnvironmentToAgent, AgentError> {
        if message.run_id() != self.run_id {
            return Err(AgentError::Service(AgentServiceError::new(
                AgentServiceErrorType::AgentNotFound,
                format!("no run with id {}", message.run_id()),
            )));
        }
        self.enter_running().await?;

        let run_id = self.run_id;
        match message {
            AgentToEnvironment::ToolCall { content, .. } => Ok(EnvironmentToAgent::ToolResult {
                run_id,
                content: self.dispatcher.dispatch(content).await,
            }),
            AgentToEnvironment::ToolCalls { content, .. } => Ok(EnvironmentToAgent::ToolResults {
                run_id,
                content: self.dispatcher.dispatch_all(content).await,
            }),
            AgentToEnvironment::Error { error, .. } => {
                self.handle_error(AgentError::Service(error)).await?;
                Ok(EnvironmentToAgent::Terminated {
                    run_id,
                    result: None,
                })
            }
            AgentToEnvironment::Termination { content, .. } => {
                let result = termination_result(content)?;
                self.terminate(result.clone()).await;
                Ok(EnvironmentToAgent::Terminated { run_id, result })
            }
        }
    }

    async fn enter_running(&self) -> Result<(), AgentError> {
        let mut phase = self.phase.lock().await;
        match *phase {
            RunPhase::Terminated => Err(AgentError::Precondition(format!(
                "run {} has already terminated",
                self.run_id
            ))),
            RunPhase::Init => {
                log::debug!("Run {} entered the running phase", self.run_id);
                *phase = RunPhase::Running;
                Ok(())
            }
            RunPhase::Running => Ok(()),
        }
    }

    async fn terminate(&self, result: Option<String>) {
        *self.phase.lock().await = RunPhase::Terminated;
        if let Some(tx) = self.result.lock().await.take() {
            // The receiver is gone only when the caller stopped waiting.
            let _ = tx.send(result);
        }
    }

    async fn handle_error(&self, error: AgentError) -> Result<(), AgentError> {
        let handled = self.error_handlers.iter().any(|h| h.handle(&error));
        self.terminate(None).await;
        if handled {
            log::info!("Run {} stopped by a handled error: {}", self.run_id, error);
            Ok(())
        } else {
            log::error!("Run {} failed: {}", self.run_id, error);
            Err(error)
        }
    }
}

/// Extracts the final result, rejecting anything but a well-formed call of
/// the termination tool.
fn termination_result(content: Option<TerminationContent>) -> Result<Option<String>, AgentError> {
    let content = content.ok_or_else(|| {
        AgentError::Precondition("termination message carries no content".to_string())
    })?;
    if content.tool_name != TERMINATION_TOOL {
        return Err(AgentError::Precondition(format!(
            "termination must call '{}', not '{}'",
            TERMINATION_TOOL, content.tool_name
        )));
    }
    match content.tool_args.get(TERMINATION_RESULT_KEY) {
        None => Err(AgentError::Precondition(format!(
            "termination is missing the '{}' argument",
            TERMINATION_RESULT_KEY
        ))),
        Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Ok(Some(other.to_string())),
    }
}

#[async_trait]
impl AgentEnvironment for RunEnvironment {
    async fn execute_tool(&self, call: ToolCall) -> Result<ReceivedToolResult, AgentError> {
        self.enter_running().await?;
        Ok(self.dispatcher.dispatch_call(call).await)
    }

    async fn execute_tools(
        &self,
        calls: Vec<ToolCall>,
    ) -> Result<Vec<ReceivedToolResult>, AgentError> {
        self.enter_running().await?;
        Ok(self.dispatcher.dispatch_calls(calls).await)
    }

    async fn report_problem(&self, error: AgentError) -> Result<(), AgentError> {
        if self.phase().await == RunPhase::Terminated {
            return Err(error);
        }
        self.handle_error(error).await
    }

    async fn send_termination_message(&self, result: Option<String>) -> Result<(), AgentError> {
        self.process(AgentToEnvironment::Termination {
            run_id: self.run_id,
            content: Some(TerminationContent {
                tool_name: TERMINATION_TOOL.to_string(),
                tool_args: serde_json::json!({ TERMINATION_RESULT_KEY: result }),
            }),
        })
        .await
        .map(|_| ())
    }
}
