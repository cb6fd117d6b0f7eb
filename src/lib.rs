//! # Stratagem
//!
//! An agent orchestration engine: strategies are typed graphs of nodes joined by
//! guarded edges, nodes talk to a language model through read and write
//! sessions over one shared conversation, and tool calls are dispatched to a
//! staged registry with every outcome reported to installed features.
//!
//! ## Features
//!
//! - **Typed Graphs**: node inputs and outputs are checked when the strategy is built
//! - **Consistent Sessions**: a write session publishes its changes only if its block succeeds
//! - **Isolated Tools**: tool failures become results the model can read, never panics
//! - **Pluggable Observers**: features hook into agent, node, LLM and tool events
//! - **Optional LLM Integration**: an Ollama client behind the `llm` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use serde::Deserialize;
//! use stratagem::prelude::*;
//! use stratagem::testing::MockLLMClient;
//!
//! #[derive(Deserialize)]
//! struct PlusArgs {
//!     a: i64,
//!     b: i64,
//! }
//!
//! struct Plus;
//!
//! #[async_trait]
//! impl Tool for Plus {
//!     type Args = PlusArgs;
//!     type Output = i64;
//!
//!     fn descriptor(&self) -> ToolDescriptor {
//!         ToolDescriptor::new("plus", "Adds two integers")
//!             .required("a", "left operand", ToolParameterType::Integer)
//!             .required("b", "right operand", ToolParameterType::Integer)
//!     }
//!
//!     async fn execute(&self, args: PlusArgs) -> Result<i64, ToolError> {
//!         Ok(args.a + args.b)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), AgentError> {
//! let client = MockLLMClient::new()
//!     .tool_call("plus", serde_json::json!({"a": 2, "b": 2}))
//!     .reply("2 + 2 = 4");
//! let registry = ToolRegistry::builder()
//!     .stage(ToolStage::new(DEFAULT_STAGE).tool(Plus))
//!     .build()?;
//!
//! let agent = AIAgent::builder(Arc::new(client), single_run_strategy(ToolCallMode::Sequential)?)
//!     .with_tool_registry(registry)
//!     .build()
//!     .await?;
//! let answer = agent.run_and_get_result("What is 2 + 2?").await?;
//! assert_eq!(answer.as_deref(), Some("2 + 2 = 4"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`graph`]: strategies, nodes, edges and the prebuilt node library
//! - [`session`]: the shared LLM context and its read and write sessions
//! - [`tools`]: tool traits, descriptors and the staged registry
//! - [`agent`]: the agent runner and the environment executing tool calls
//! - [`feature`]: lifecycle hooks, [`EventHandler`] and the feature pipeline
//! - [`memory`]: fact storage and the nodes moving facts in and out of prompts
//! - [`telemetry`]: the tracing feature and its sinks
//! - [`llm`]: the provider interface and adapters
//! - [`testing`]: a scripted client for driving strategies in tests
//! - [`prelude`]: commonly used types and traits (import with `use stratagem::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

pub use crate::core::{agent, feature, graph, memory, session, telemetry, tools};

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Values and errors
pub use crate::core::error::{AgentError, FeatureError, GraphError, RegistryError, ToolError};
pub use crate::core::validation::{ValidationIssue, ValidationResult};
pub use crate::core::value::{NodeValue, ValueKind};

// Configuration and run context
pub use crate::core::config::{AgentConfig, DEFAULT_MAX_AGENT_ITERATIONS};
pub use crate::core::context::{AgentContext, AgentStorage};

// Prompts
pub use crate::core::prompt::{
    LLMParams, Message, Prompt, PromptBuilder, ToolCall, ToolChoice, ToolResultMessage,
};

// Graph
pub use crate::core::graph::nodes::{
    node_do_nothing, node_execute_multiple_tools, node_execute_tool, node_llm_compress_history,
    node_llm_request, node_llm_request_multiple, node_llm_request_streaming,
    node_llm_request_structured, node_llm_send_multiple_tool_results, node_llm_send_tool_result,
    node_update_prompt,
};
pub use crate::core::graph::{
    Edge, FINISH, NodeFuture, NodeLogic, START, Strategy, StrategyBuilder, StrategyNode,
    ToolCallMode, single_run_strategy,
};

// Sessions
pub use crate::core::session::{
    LLMContext, LLMReadSession, LLMWriteSession, SessionState, StructuredRequestConfig,
    StructuredResponse,
};

// Tools
pub use crate::core::tools::descriptor::{
    ToolDescriptor, ToolParameterDescriptor, ToolParameterType,
};
pub use crate::core::tools::registry::{
    DEFAULT_STAGE, ToolRegistry, ToolRegistryBuilder, ToolStage,
};
pub use crate::core::tools::result::{ReceivedToolResult, ToolOutcome};
pub use crate::core::tools::safe::{SafeTool, SafeToolResult};
pub use crate::core::tools::tool::{AnyTool, Tool};

// Agent
pub use crate::core::agent::{
    AIAgent, AIAgentBuilder, AgentEnvironment, AgentRunOutcome, ErrorHandler, RunEnvironment,
    RunPhase, TERMINATION_RESULT_KEY, TERMINATION_TOOL, ToolDispatcher,
};

// Features
pub use crate::core::feature::handler::EventHandler;
pub use crate::core::feature::{AgentFeature, FeaturePipeline};
pub use crate::core::telemetry::{
    FileTraceSink, LogTraceSink, MemoryTraceSink, TraceSink, Tracing,
};

// Memory
pub use crate::core::memory::{
    Concept, Fact, FactType, FactValue, InMemoryMemoryProvider, MemoryProvider, MemoryScope,
    MemorySubject,
};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: imports everything needed to build and run strategies.
///
/// # Example
/// ```rust
/// use stratagem::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        // Agent
        AIAgent,
        AgentConfig,
        AgentContext,
        // Core
        AgentError,
        AgentFeature,
        AgentRunOutcome,
        DEFAULT_STAGE,
        // Graph
        Edge,
        EventHandler,
        FINISH,
        LLMContext,
        LLMReadSession,
        LLMWriteSession,
        Message,
        NodeFuture,
        NodeLogic,
        NodeValue,
        Prompt,
        START,
        SafeToolResult,
        Strategy,
        StrategyNode,
        StructuredRequestConfig,
        // Tools
        Tool,
        ToolCall,
        ToolCallMode,
        ToolDescriptor,
        ToolError,
        ToolParameterType,
        ToolRegistry,
        ToolStage,
        Tracing,
        ValueKind,
        node_do_nothing,
        node_execute_multiple_tools,
        node_execute_tool,
        node_llm_compress_history,
        node_llm_request,
        node_llm_request_multiple,
        node_llm_request_streaming,
        node_llm_request_structured,
        node_llm_send_multiple_tool_results,
        node_llm_send_tool_result,
        node_update_prompt,
        single_run_strategy,
    };
    pub use crate::llm::{LLMClient, LLModel};
}

// ============================================================================
// LLM Providers
// ============================================================================

pub mod llm;

pub use llm::{LLMClient, LLMError, LLMProvider, LLModel};

#[cfg(feature = "llm")]
pub use llm::{OllamaClient, OllamaConfig};

// ============================================================================
// Testing Support
// ============================================================================

pub mod testing;

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
