use async_trait::async_trait;

use crate::core::error::AgentError;
use crate::core::prompt::ToolCall;
use crate::core::tools::result::ReceivedToolResult;

/// The side of a run that executes tools and collects the final result.
///
/// Nodes reach it through [`AgentContext::environment`](crate::core::context::AgentContext::environment).
#[async_trait]
pub trait AgentEnvironment: Send + Sync {
    /// Executes one tool call. Tool failures come back as data, not errors.
    async fn execute_tool(&self, call: ToolCall) -> Result<ReceivedToolResult, AgentError>;

    /// Executes a batch of tool calls concurrently. Results keep the order of `calls`.
    async fn execute_tools(&self, calls: Vec<ToolCall>)
    -> Result<Vec<ReceivedToolResult>, AgentError>;

    /// Reports an error raised by the strategy.
    ///
    /// Returns `Ok` when an error handler suppressed it; the run then ends
    /// without a result.
    async fn report_problem(&self, error: AgentError) -> Result<(), AgentError>;

    /// Ends the run with `result`.
    async fn send_termination_message(&self, result: Option<String>) -> Result<(), AgentError>;
}

/// Gets first refusal on errors reported to the environment.
pub trait ErrorHandler: Send + Sync {
    /// Returns true if the error is handled and must not abort the run.
    fn handle(&self, error: &AgentError) -> bool;
}

impl<F> ErrorHandler for F
where
    F: Fn(&AgentError) -> bool + Send + Sync,
{
    fn handle(&self, error: &AgentError) -> bool {
        self(error)
    }
}
