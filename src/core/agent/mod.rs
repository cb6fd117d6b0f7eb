//! The agent runner and the environment that executes its tool calls.

pub mod dispatch;
pub mod environment;
pub mod message;
pub mod runner;

pub use dispatch::{RunEnvironment, RunPhase, ToolDispatcher};
pub use environment::{AgentEnvironment, ErrorHandler};
pub use message::{
    AgentServiceError, AgentServiceErrorType, AgentToEnvironment, EnvironmentToAgent,
    TERMINATION_RESULT_KEY, TERMINATION_TOOL, TerminationContent, ToolCallContent,
};
pub use runner::{AIAgent, AIAgentBuilder, AgentRunOutcome};
