//! Messages exchanged between a running strategy and its environment.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::tools::result::ReceivedToolResult;

/// Name of the tool a strategy "calls" to end a run.
pub const TERMINATION_TOOL: &str = "__terminate__";

/// Argument of the termination tool carrying the final result.
pub const TERMINATION_RESULT_KEY: &str = "result";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallContent {
    pub tool_call_id: Option<String>,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    /// Stage to resolve the tool in. When absent the first stage declaring the
    /// tool is used, then the default stage.
    pub stage: Option<String>,
}

impl ToolCallContent {
    pub fn new(tool_call_id: Option<String>, tool_name: impl Into<String>, tool_args: serde_json::Value) -> Self {
        Self {
            tool_call_id,
            tool_name: tool_name.into(),
            tool_args,
            stage: None,
        }
    }

    pub fn in_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationContent {
    pub tool_name: String,
    pub tool_args: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentServiceErrorType {
    UnexpectedMessageType,
    MalformedMessage,
    AgentNotFound,
    UnexpectedError,
}

impl fmt::Display for AgentServiceErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentServiceErrorType::UnexpectedMessageType => "unexpected message type",
            AgentServiceErrorType::MalformedMessage => "malformed message",
            AgentServiceErrorType::AgentNotFound => "agent not found",
            AgentServiceErrorType::UnexpectedError => "unexpected error",
        };
        f.write_str(name)
    }
}

/// A structured error reported across the agent/environment boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentServiceError {
    pub error_type: AgentServiceErrorType,
    pub message: String,
}

impl AgentServiceError {
    pub fn new(error_type: AgentServiceErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }
}

impl fmt::Display for AgentServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for AgentServiceError {}

/// Outbound messages, from the strategy to the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentToEnvironment {
    ToolCall {
        run_id: Uuid,
        content: ToolCallContent,
    },
    ToolCalls {
        run_id: Uuid,
        content: Vec<ToolCallContent>,
    },
    Error {
        run_id: Uuid,
        error: AgentServiceError,
    },
    Termination {
        run_id: Uuid,
        content: Option<TerminationContent>,
    },
}

impl AgentToEnvironment {
    pub fn run_id(&self) -> Uuid {
        match self {
            AgentToEnvironment::ToolCall { run_id, .. }
            | AgentToEnvironment::ToolCalls { run_id, .. }
            | AgentToEnvironment::Error { run_id, .. }
            | AgentToEnvironment::Termination { run_id, .. } => *run_id,
        }
    }
}

/// Inbound messages, from the environment back to the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentToAgent {
    ToolResult {
        run_id: Uuid,
        content: ReceivedToolResult,
    },
    ToolResults {
        run_id: Uuid,
        content: Vec<ReceivedToolResult>,
    },
    Terminated {
        run_id: Uuid,
        result: Option<String>,
    },
}
