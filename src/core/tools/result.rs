use serde::{Deserialize, Serialize};

use crate::core::prompt::{Message, ToolResultMessage};

/// How a dispatched tool call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success,
    NotFound,
    DecodeFailure,
    ValidationFailure,
    Failure,
}

/// A tool result as seen by the strategy after the environment ran the call.
///
/// Failures are carried as text in [`content`](ReceivedToolResult::content) so the
/// model can read them and correct itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedToolResult {
    pub id: Option<String>,
    pub tool: String,
    pub content: String,
    pub outcome: ToolOutcome,
    /// Structured result, present on success.
    pub result: Option<serde_json::Value>,
}

impl ReceivedToolResult {
    pub fn is_success(&self) -> bool {
        self.outcome == ToolOutcome::Success
    }

    pub fn to_message(&self) -> Message {
        Message::ToolResult(ToolResultMessage {
            id: self.id.clone(),
            tool: self.tool.clone(),
            content: self.content.clone(),
        })
    }
}
