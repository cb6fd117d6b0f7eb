use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;

use crate::core::error::ToolError;
use crate::core::tools::tool::Tool;

/// Tagged outcome of a tool execution. Never an `Err`: failures are data.
#[derive(Debug, Clone, PartialEq)]
pub enum SafeToolResult<R = serde_json::Value> {
    Success { result: R, content: String },
    ValidationFailure { message: String },
    Failure { message: String },
}

impl<R> SafeToolResult<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, SafeToolResult::Success { .. })
    }

    /// Text to hand back to the model, whatever the outcome.
    pub fn content(&self) -> &str {
        match self {
            SafeToolResult::Success { content, .. } => content,
            SafeToolResult::ValidationFailure { message } | SafeToolResult::Failure { message } => {
                message
            }
        }
    }

    pub fn result(&self) -> Option<&R> {
        match self {
            SafeToolResult::Success { result, .. } => Some(result),
            _ => None,
        }
    }
}

impl<R: Serialize> SafeToolResult<R> {
    /// Erases the result type into JSON.
    pub fn into_json(self) -> SafeToolResult {
        match self {
            SafeToolResult::Success { result, content } => match serde_json::to_value(&result) {
                Ok(result) => SafeToolResult::Success { result, content },
                Err(e) => SafeToolResult::Failure {
                    message: format!("Failed to serialize tool result: {}", e),
                },
            },
            SafeToolResult::ValidationFailure { message } => {
                SafeToolResult::ValidationFailure { message }
            }
            SafeToolResult::Failure { message } => SafeToolResult::Failure { message },
        }
    }
}

/// Runs a tool so that nothing it does escapes as an error or a panic.
pub struct SafeTool<'a, T: Tool> {
    tool: &'a T,
}

impl<'a, T: Tool> SafeTool<'a, T> {
    pub fn new(tool: &'a T) -> Self {
        Self { tool }
    }

    pub async fn execute(&self, args: T::Args) -> SafeToolResult<T::Output> {
        let name = self.tool.descriptor().name;

        if let Err(e) = self.tool.validate(&args) {
            return classify(&name, e);
        }

        let output = match AssertUnwindSafe(self.tool.execute(args))
            .catch_unwind()
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return classify(&name, e),
            Err(panic) => {
                log::error!("Tool '{}' panicked during execution", name);
                return SafeToolResult::Failure {
                    message: format!("Tool '{}' panicked: {}", name, panic_message(&panic)),
                };
            }
        };

        match self.tool.encode_result(&output) {
            Ok(content) => SafeToolResult::Success {
                result: output,
                content,
            },
            Err(e) => SafeToolResult::Failure {
                message: format!("Tool '{}' result could not be encoded: {}", name, e),
            },
        }
    }
}

fn classify<R>(name: &str, error: ToolError) -> SafeToolResult<R> {
    match error {
        ToolError::Validation(msg) => SafeToolResult::ValidationFailure {
            message: format!("Tool '{}' rejected its arguments: {}", name, msg),
        },
        ToolError::Execution(msg) => SafeToolResult::Failure {
            message: format!("Tool '{}' failed: {}", name, msg),
        },
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
