//! Payloads handed to [`AgentFeature`](super::AgentFeature) hooks.
//!
//! Every payload is serializable so tracing sinks can persist it verbatim.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::prompt::{Message, Prompt};
use crate::core::tools::descriptor::ToolDescriptor;
use crate::core::value::NodeValue;
use crate::llm::LLModel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCreatedEvent {
    pub agent_id: String,
    pub strategy_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStartedEvent {
    pub agent_id: String,
    pub run_id: Uuid,
    pub strategy_name: String,
    pub input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFinishedEvent {
    pub agent_id: String,
    pub run_id: Uuid,
    pub strategy_name: String,
    pub result: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunErrorEvent {
    pub agent_id: String,
    pub run_id: Uuid,
    pub strategy_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStartedEvent {
    pub run_id: Uuid,
    pub strategy_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyFinishedEvent {
    pub run_id: Uuid,
    pub strategy_name: String,
    pub result: NodeValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeforeNodeEvent {
    pub run_id: Uuid,
    pub node_name: String,
    pub input: NodeValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfterNodeEvent {
    pub run_id: Uuid,
    pub node_name: String,
    pub input: NodeValue,
    pub output: NodeValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeErrorEvent {
    pub run_id: Uuid,
    pub node_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeforeLLMCallEvent {
    pub run_id: Uuid,
    pub prompt: Prompt,
    pub model: LLModel,
    /// Tools offered to the model; empty for requests without tools.
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfterLLMCallEvent {
    pub run_id: Uuid,
    pub model: LLModel,
    pub responses: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallEvent {
    pub run_id: Uuid,
    pub tool_call_id: Option<String>,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolValidationErrorEvent {
    pub run_id: Uuid,
    pub tool_call_id: Option<String>,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFailureEvent {
    pub run_id: Uuid,
    pub tool_call_id: Option<String>,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResultEvent {
    pub run_id: Uuid,
    pub tool_call_id: Option<String>,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    pub result: String,
}

/// Any hook payload, as recorded by tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    AgentCreated(AgentCreatedEvent),
    AgentStarted(AgentStartedEvent),
    AgentFinished(AgentFinishedEvent),
    AgentRunError(AgentRunErrorEvent),
    StrategyStarted(StrategyStartedEvent),
    StrategyFinished(StrategyFinishedEvent),
    BeforeNode(BeforeNodeEvent),
    AfterNode(AfterNodeEvent),
    NodeError(NodeErrorEvent),
    BeforeLLMCall(BeforeLLMCallEvent),
    AfterLLMCall(AfterLLMCallEvent),
    ToolCall(ToolCallEvent),
    ToolValidationError(ToolValidationErrorEvent),
    ToolCallFailure(ToolCallFailureEvent),
    ToolCallResult(ToolCallResultEvent),
}

impl AgentEvent {
    /// Short stable name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            AgentEvent::AgentCreated(_) => "agent_created",
            AgentEvent::AgentStarted(_) => "agent_started",
            AgentEvent::AgentFinished(_) => "agent_finished",
            AgentEvent::AgentRunError(_) => "agent_run_error",
            AgentEvent::StrategyStarted(_) => "strategy_started",
            AgentEvent::StrategyFinished(_) => "strategy_finished",
            AgentEvent::BeforeNode(_) => "before_node",
            AgentEvent::AfterNode(_) => "after_node",
            AgentEvent::NodeError(_) => "node_error",
            AgentEvent::BeforeLLMCall(_) => "before_llm_call",
            AgentEvent::AfterLLMCall(_) => "after_llm_call",
            AgentEvent::ToolCall(_) => "tool_call",
            AgentEvent::ToolValidationError(_) => "tool_validation_error",
            AgentEvent::ToolCallFailure(_) => "tool_call_failure",
            AgentEvent::ToolCallResult(_) => "tool_call_result",
        }
    }
}
